//! Deterministic batch gradient-descent trainers.
//!
//! Both trainers z-score the inputs first and store the normalisation in the
//! returned network, so `DenseNetwork::forward` can be fed raw feature
//! vectors. No randomness: weights start at zero.

use serde::{Deserialize, Serialize};

use super::dense::{fit_normalization, softmax, Activation, DenseLayer, DenseNetwork};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 300,
            learning_rate: 0.1,
            l2: 1e-3,
        }
    }
}

/// Metrics reported by `Predictor::train`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrainingMetrics {
    pub samples: usize,
    pub features: usize,
    pub epochs: usize,
    /// Classifiers only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_loss: Option<f64>,
    /// Regressors only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
}

/// Multinomial logistic regression; `labels[i]` is a class index < `n_classes`
pub fn train_softmax(
    rows: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
    opts: TrainOptions,
) -> (DenseNetwork, TrainingMetrics) {
    let dim = rows.first().map(|r| r.len()).unwrap_or(0);
    let (mean, std) = fit_normalization(rows);
    let mut net = DenseNetwork {
        input_dim: dim,
        input_mean: Some(mean),
        input_std: Some(std),
        layers: vec![DenseLayer::zeros(dim, n_classes, Activation::Softmax)],
        metadata: serde_json::Value::Null,
    };
    let xs: Vec<Vec<f64>> = rows.iter().map(|r| net.normalize(r)).collect();
    let n = xs.len().max(1) as f64;

    for _ in 0..opts.epochs {
        let layer = &net.layers[0];
        let mut grad_w = vec![vec![0.0; dim]; n_classes];
        let mut grad_b = vec![0.0; n_classes];
        for (x, &y) in xs.iter().zip(labels) {
            let probs = class_probs(layer, x);
            for k in 0..n_classes {
                let err = probs[k] - if k == y { 1.0 } else { 0.0 };
                grad_b[k] += err / n;
                for (g, v) in grad_w[k].iter_mut().zip(x) {
                    *g += err * v / n;
                }
            }
        }
        let layer = &mut net.layers[0];
        for k in 0..n_classes {
            layer.bias[k] -= opts.learning_rate * grad_b[k];
            for (w, g) in layer.weights[k].iter_mut().zip(&grad_w[k]) {
                *w -= opts.learning_rate * (g + opts.l2 * *w);
            }
        }
    }

    let layer = &net.layers[0];
    let mut correct = 0usize;
    let mut loss = 0.0;
    for (x, &y) in xs.iter().zip(labels) {
        let probs = class_probs(layer, x);
        if argmax(&probs) == y {
            correct += 1;
        }
        loss -= probs[y].max(1e-12).ln();
    }

    let metrics = TrainingMetrics {
        samples: xs.len(),
        features: dim,
        epochs: opts.epochs,
        accuracy: Some(correct as f64 / n),
        log_loss: Some(loss / n),
        mae: None,
    };
    (net, metrics)
}

/// Poisson regression with a log link on non-negative counts
pub fn train_poisson(
    rows: &[Vec<f64>],
    targets: &[f64],
    opts: TrainOptions,
) -> (DenseNetwork, TrainingMetrics) {
    let dim = rows.first().map(|r| r.len()).unwrap_or(0);
    let (mean, std) = fit_normalization(rows);
    let n = rows.len().max(1) as f64;
    let mean_target = (targets.iter().sum::<f64>() / n).max(1e-3);

    let mut layer = DenseLayer::zeros(dim, 1, Activation::Exp);
    layer.bias[0] = mean_target.ln();
    let mut net = DenseNetwork {
        input_dim: dim,
        input_mean: Some(mean),
        input_std: Some(std),
        layers: vec![layer],
        metadata: serde_json::Value::Null,
    };
    let xs: Vec<Vec<f64>> = rows.iter().map(|r| net.normalize(r)).collect();

    for _ in 0..opts.epochs {
        let layer = &net.layers[0];
        let mut grad_w = vec![0.0; dim];
        let mut grad_b = 0.0;
        for (x, y) in xs.iter().zip(targets) {
            let err = rate(layer, x) - y;
            grad_b += err / n;
            for (g, v) in grad_w.iter_mut().zip(x) {
                *g += err * v / n;
            }
        }
        let layer = &mut net.layers[0];
        layer.bias[0] -= opts.learning_rate * grad_b;
        for (w, g) in layer.weights[0].iter_mut().zip(&grad_w) {
            *w -= opts.learning_rate * (g + opts.l2 * *w);
        }
    }

    let layer = &net.layers[0];
    let mae = xs
        .iter()
        .zip(targets)
        .map(|(x, y)| (rate(layer, x) - y).abs())
        .sum::<f64>()
        / n;

    let metrics = TrainingMetrics {
        samples: xs.len(),
        features: dim,
        epochs: opts.epochs,
        accuracy: None,
        log_loss: None,
        mae: Some(mae),
    };
    (net, metrics)
}

pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}

fn class_probs(layer: &DenseLayer, x: &[f64]) -> Vec<f64> {
    let logits: Vec<f64> = layer
        .weights
        .iter()
        .zip(&layer.bias)
        .map(|(row, b)| b + row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>())
        .collect();
    softmax(&logits)
}

fn rate(layer: &DenseLayer, x: &[f64]) -> f64 {
    let z = layer.bias[0]
        + layer.weights[0]
            .iter()
            .zip(x)
            .map(|(w, v)| w * v)
            .sum::<f64>();
    z.clamp(-30.0, 30.0).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_regression_separates_classes() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let t = i as f64 / 10.0;
            rows.push(vec![t, 1.0]);
            labels.push(0);
            rows.push(vec![-t - 0.5, 1.0]);
            labels.push(1);
        }
        let (net, metrics) = train_softmax(&rows, &labels, 2, TrainOptions::default());
        assert!(metrics.accuracy.unwrap() > 0.95);
        let p = net.forward(&[2.0, 1.0]).unwrap();
        assert!(p[0] > p[1]);
    }

    #[test]
    fn poisson_regression_tracks_mean_rate() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![(i % 2) as f64]).collect();
        let targets: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { 4.0 }).collect();
        let opts = TrainOptions {
            epochs: 500,
            ..Default::default()
        };
        let (net, metrics) = train_poisson(&rows, &targets, opts);
        let low = net.forward_scalar(&[0.0]).unwrap();
        let high = net.forward_scalar(&[1.0]).unwrap();
        assert!(high > low);
        assert!(metrics.mae.unwrap() < 1.0);
    }

    #[test]
    fn training_is_deterministic() {
        let rows = vec![vec![1.0, 2.0], vec![2.0, 0.5], vec![0.0, 1.0]];
        let labels = vec![0, 1, 2];
        let a = train_softmax(&rows, &labels, 3, TrainOptions::default());
        let b = train_softmax(&rows, &labels, 3, TrainOptions::default());
        assert_eq!(a.0, b.0);
    }
}
