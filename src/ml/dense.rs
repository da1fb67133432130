//! Dense model container shared by the predictors.
//!
//! A predictor's trained parameters are one `DenseNetwork`: optional z-score
//! normalisation followed by one or more dense layers. Classifiers end in a
//! softmax layer, the goal-rate model ends in an exponential link. The whole
//! struct serialises to JSON so it can be stored and reloaded by id.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BetSignalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    /// Applied across the whole layer output
    Softmax,
    /// Log link, used for count rates
    Exp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weights shape: [out_dim][in_dim]
    pub weights: Vec<Vec<f64>>,
    /// Bias shape: [out_dim]
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn zeros(in_dim: usize, out_dim: usize, activation: Activation) -> Self {
        Self {
            weights: vec![vec![0.0; in_dim]; out_dim],
            bias: vec![0.0; out_dim],
            activation,
        }
    }

    fn in_dim(&self) -> usize {
        self.weights.first().map(|r| r.len()).unwrap_or(0)
    }

    fn out_dim(&self) -> usize {
        self.weights.len()
    }

    fn apply(&self, x: &[f64]) -> Vec<f64> {
        let pre: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| b + row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>())
            .collect();

        match self.activation {
            Activation::Softmax => softmax(&pre),
            act => pre.into_iter().map(|v| apply_activation(v, act)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub input_dim: usize,

    /// Optional z-score normalization.
    #[serde(default)]
    pub input_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub input_std: Option<Vec<f64>>,

    pub layers: Vec<DenseLayer>,

    /// Training info (metrics, label set, timestamps)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl DenseNetwork {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(content)?;
        model.validate().map_err(BetSignalError::Validation)?;
        Ok(model)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input_dim == 0 {
            return Err("input_dim must be > 0".to_string());
        }
        if self.layers.is_empty() {
            return Err("layers must not be empty".to_string());
        }
        match (&self.input_mean, &self.input_std) {
            (Some(mean), Some(std)) => {
                if mean.len() != self.input_dim || std.len() != self.input_dim {
                    return Err(format!(
                        "normalisation length {}/{} != input_dim {}",
                        mean.len(),
                        std.len(),
                        self.input_dim
                    ));
                }
                if std.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                    return Err("input_std must be finite and > 0".to_string());
                }
            }
            (None, None) => {}
            _ => return Err("input_mean and input_std must be provided together".to_string()),
        }

        let mut expected_in = self.input_dim;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.out_dim() == 0 {
                return Err(format!("layer[{idx}] out_dim must be > 0"));
            }
            if layer.bias.len() != layer.out_dim() {
                return Err(format!(
                    "layer[{idx}] bias len {} != out_dim {}",
                    layer.bias.len(),
                    layer.out_dim()
                ));
            }
            for (r, row) in layer.weights.iter().enumerate() {
                if row.len() != expected_in {
                    return Err(format!(
                        "layer[{idx}] weights row {r} len {} != expected in_dim {expected_in}",
                        row.len()
                    ));
                }
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(format!("layer[{idx}] weights contain non-finite values"));
                }
            }
            if layer.bias.iter().any(|v| !v.is_finite()) {
                return Err(format!("layer[{idx}] bias contain non-finite values"));
            }
            expected_in = layer.out_dim();
        }
        Ok(())
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.out_dim()).unwrap_or(0)
    }

    /// Apply the stored z-score normalisation, if any
    pub fn normalize(&self, input: &[f64]) -> Vec<f64> {
        match (&self.input_mean, &self.input_std) {
            (Some(mean), Some(std)) => input
                .iter()
                .zip(mean.iter().zip(std))
                .map(|(x, (m, s))| (x - m) / s.max(1e-12))
                .collect(),
            _ => input.to_vec(),
        }
    }

    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.input_dim {
            return Err(BetSignalError::Validation(format!(
                "DenseNetwork input dim mismatch: got {}, expected {}",
                input.len(),
                self.input_dim
            )));
        }

        let mut x = self.normalize(input);
        for layer in &self.layers {
            debug_assert_eq!(layer.in_dim(), x.len());
            x = layer.apply(&x);
        }
        Ok(x)
    }

    pub fn forward_scalar(&self, input: &[f64]) -> Result<f64> {
        let out = self.forward(input)?;
        match out.as_slice() {
            [v] => Ok(*v),
            _ => Err(BetSignalError::Validation(format!(
                "DenseNetwork forward_scalar expects output_dim=1, got {}",
                out.len()
            ))),
        }
    }

    /// Normalised mean absolute first-layer weight per input.
    ///
    /// Inputs are z-scored before the first layer, so weight magnitudes are
    /// comparable across features.
    pub fn input_importance(&self) -> Vec<f64> {
        let Some(first) = self.layers.first() else {
            return Vec::new();
        };
        let mut raw = vec![0.0; self.input_dim];
        for row in &first.weights {
            for (acc, w) in raw.iter_mut().zip(row) {
                *acc += w.abs();
            }
        }
        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return vec![1.0 / self.input_dim as f64; self.input_dim];
        }
        raw.into_iter().map(|v| v / total).collect()
    }
}

/// Column means and standard deviations; constant columns get std 1
pub fn fit_normalization(rows: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let dim = rows.first().map(|r| r.len()).unwrap_or(0);
    let n = rows.len().max(1) as f64;
    let mut mean = vec![0.0; dim];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut std = vec![0.0; dim];
    for row in rows {
        for ((s, v), m) in std.iter_mut().zip(row).zip(&mean) {
            *s += (v - m).powi(2) / n;
        }
    }
    let std = std
        .into_iter()
        .map(|var| {
            let s = var.sqrt();
            if s.is_finite() && s > 1e-9 {
                s
            } else {
                1.0
            }
        })
        .collect();
    (mean, std)
}

fn apply_activation(x: f64, act: Activation) -> f64 {
    match act {
        Activation::Linear | Activation::Softmax => x,
        Activation::Relu => x.max(0.0),
        Activation::Sigmoid => sigmoid(x),
        Activation::Exp => x.clamp(-30.0, 30.0).exp(),
    }
}

pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

fn sigmoid(x: f64) -> f64 {
    // Numerically-stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(weights: Vec<Vec<f64>>, bias: Vec<f64>, activation: Activation) -> DenseNetwork {
        DenseNetwork {
            input_dim: weights[0].len(),
            input_mean: None,
            input_std: None,
            layers: vec![DenseLayer {
                weights,
                bias,
                activation,
            }],
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn softmax_layer_sums_to_one() {
        let net = linear(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]],
            vec![0.0, 0.0, 0.0],
            Activation::Softmax,
        );
        net.validate().unwrap();
        let out = net.forward(&[2.0, -1.0]).unwrap();
        assert_eq!(out.len(), 3);
        assert!((out.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(out[0] > out[2] && out[2] > out[1]);
    }

    #[test]
    fn exp_link_is_positive() {
        let net = linear(vec![vec![0.0]], vec![2.5_f64.ln()], Activation::Exp);
        let rate = net.forward_scalar(&[10.0]).unwrap();
        assert!((rate - 2.5).abs() < 1e-9);
    }

    #[test]
    fn validates_shapes() {
        let mut bad = linear(vec![vec![1.0, 2.0]], vec![0.0], Activation::Linear);
        bad.input_dim = 3;
        assert!(bad.validate().is_err());
        assert!(bad.forward(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn constant_columns_keep_unit_std() {
        let (mean, std) = fit_normalization(&[vec![1.0, 4.0], vec![1.0, 6.0]]);
        assert_eq!(mean, vec![1.0, 5.0]);
        assert_eq!(std, vec![1.0, 1.0]);
    }

    #[test]
    fn importance_is_normalised() {
        let net = linear(
            vec![vec![3.0, -1.0], vec![-1.0, 0.0]],
            vec![0.0, 0.0],
            Activation::Softmax,
        );
        let imp = net.input_importance();
        assert!((imp[0] - 0.8).abs() < 1e-12);
        assert!((imp[1] - 0.2).abs() < 1e-12);
    }
}
