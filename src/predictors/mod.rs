//! Predictor contract and the three match predictors.
//!
//! A predictor is a pure feature extractor plus a trained model. `prepare`
//! is deterministic and stateless over the snapshot; `predict` needs loaded
//! parameters; `train` replaces them.

pub mod next_goal;
pub mod over_under;
pub mod registry;
pub mod winner;

pub use next_goal::NextGoalPredictor;
pub use over_under::OverUnderPredictor;
pub use registry::{PredictorRegistry, PredictorStatus};
pub use winner::WinnerPredictor;

use crate::domain::{Explanation, FeatureContribution, MatchSnapshot, PredictorId};
use crate::error::PredictorError;
use crate::ml::{train_softmax, DenseNetwork, TrainOptions, TrainingMetrics};

/// Ordered numeric input of one predictor. Never empty, never NaN/Inf.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(predictor: PredictorId, values: Vec<f64>) -> Result<Self, PredictorError> {
        if values.is_empty() {
            return Err(PredictorError::InvalidFeature {
                predictor: predictor.to_string(),
                reason: "empty feature vector".to_string(),
            });
        }
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(PredictorError::InvalidFeature {
                predictor: predictor.to_string(),
                reason: format!("non-finite value at index {idx}"),
            });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Raw model output for one feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub probability: f64,
    pub confidence: f64,
    /// Per-class probabilities in class order
    pub class_probabilities: Vec<(String, f64)>,
}

pub trait Predictor: Send + Sync {
    fn id(&self) -> PredictorId;

    fn feature_names(&self) -> &'static [&'static str];

    fn prepare(&self, snapshot: &MatchSnapshot) -> Result<FeatureVector, PredictorError>;

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError>;

    /// Fit new parameters. Rows and labels are index-aligned.
    fn train(
        &mut self,
        features: &[FeatureVector],
        labels: &[String],
    ) -> Result<TrainingMetrics, PredictorError>;

    fn is_trained(&self) -> bool;

    fn parameters(&self) -> Option<&DenseNetwork>;

    fn load(&mut self, parameters: DenseNetwork) -> Result<(), PredictorError>;

    /// Sorted by descending importance
    fn feature_importance(&self) -> Vec<FeatureContribution> {
        let Some(params) = self.parameters() else {
            return Vec::new();
        };
        let mut contributions: Vec<FeatureContribution> = self
            .feature_names()
            .iter()
            .zip(params.input_importance())
            .map(|(name, importance)| FeatureContribution {
                name: name.to_string(),
                importance,
            })
            .collect();
        contributions.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        contributions
    }

    fn explain(&self, prediction: &Prediction) -> Explanation {
        let features: Vec<FeatureContribution> =
            self.feature_importance().into_iter().take(5).collect();
        let drivers = features
            .iter()
            .map(|f| format!("{} ({:.1}%)", f.name, f.importance * 100.0))
            .collect::<Vec<_>>()
            .join(", ");
        let text = if drivers.is_empty() {
            format!(
                "{} predicts {} with confidence {:.1}%",
                self.id(),
                prediction.label,
                prediction.confidence * 100.0
            )
        } else {
            format!(
                "{} predicts {} with confidence {:.1}%, driven by {}",
                self.id(),
                prediction.label,
                prediction.confidence * 100.0,
                drivers
            )
        };
        Explanation { features, text }
    }
}

/// Top-1 minus top-2 probability, or the single probability for scalar output
pub fn confidence_gap(probabilities: &[f64]) -> f64 {
    let mut sorted = probabilities.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    match sorted.as_slice() {
        [] => 0.0,
        [only] => only.clamp(0.0, 1.0),
        [first, second, ..] => (first - second).clamp(0.0, 1.0),
    }
}

/// Mean points of the last five results, 0.5 when unknown
pub fn form_score(form: &[crate::domain::FormResult]) -> f64 {
    let recent = last_n(form, 5);
    if recent.is_empty() {
        return 0.5;
    }
    recent.iter().map(|r| r.points()).sum::<f64>() / recent.len() as f64
}

pub(crate) fn last_n<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

pub(crate) fn check_training_set(
    id: PredictorId,
    features: &[FeatureVector],
    labels: &[String],
    expected_dim: usize,
) -> Result<(), PredictorError> {
    if features.is_empty() || labels.is_empty() {
        return Err(PredictorError::EmptyDataset(id.to_string()));
    }
    if features.len() != labels.len() {
        return Err(PredictorError::LabelMismatch {
            predictor: id.to_string(),
            features: features.len(),
            labels: labels.len(),
        });
    }
    if let Some(bad) = features.iter().find(|f| f.len() != expected_dim) {
        return Err(PredictorError::InvalidFeature {
            predictor: id.to_string(),
            reason: format!("expected {expected_dim} features, got {}", bad.len()),
        });
    }
    Ok(())
}

pub(crate) fn check_input<'a>(
    id: PredictorId,
    params: Option<&'a DenseNetwork>,
    features: &FeatureVector,
) -> Result<&'a DenseNetwork, PredictorError> {
    let params = params.ok_or_else(|| PredictorError::NotTrained(id.to_string()))?;
    if features.len() != params.input_dim {
        return Err(PredictorError::InvalidFeature {
            predictor: id.to_string(),
            reason: format!(
                "expected {} features, got {}",
                params.input_dim,
                features.len()
            ),
        });
    }
    Ok(params)
}

pub(crate) fn check_loaded(
    id: PredictorId,
    parameters: &DenseNetwork,
    expected_dim: usize,
    expected_outputs: usize,
) -> Result<(), PredictorError> {
    parameters
        .validate()
        .map_err(|reason| PredictorError::InvalidFeature {
            predictor: id.to_string(),
            reason,
        })?;
    if parameters.input_dim != expected_dim || parameters.output_dim() != expected_outputs {
        return Err(PredictorError::InvalidFeature {
            predictor: id.to_string(),
            reason: format!(
                "parameter shape {}x{} != {}x{}",
                parameters.input_dim,
                parameters.output_dim(),
                expected_dim,
                expected_outputs
            ),
        });
    }
    Ok(())
}

/// Softmax classifier shared by the categorical predictors
#[derive(Debug, Clone)]
pub(crate) struct Classifier {
    id: PredictorId,
    classes: &'static [&'static str],
    dim: usize,
    network: Option<DenseNetwork>,
}

impl Classifier {
    pub(crate) fn new(id: PredictorId, classes: &'static [&'static str], dim: usize) -> Self {
        Self {
            id,
            classes,
            dim,
            network: None,
        }
    }

    pub(crate) fn network(&self) -> Option<&DenseNetwork> {
        self.network.as_ref()
    }

    pub(crate) fn load(&mut self, parameters: DenseNetwork) -> Result<(), PredictorError> {
        check_loaded(self.id, &parameters, self.dim, self.classes.len())?;
        self.network = Some(parameters);
        Ok(())
    }

    pub(crate) fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError> {
        let network = check_input(self.id, self.network.as_ref(), features)?;
        let probs = network
            .forward(features.values())
            .map_err(|e| PredictorError::InvalidFeature {
                predictor: self.id.to_string(),
                reason: e.to_string(),
            })?;

        let best = crate::ml::train::argmax(&probs);
        Ok(Prediction {
            label: self.classes[best].to_string(),
            probability: probs[best],
            confidence: confidence_gap(&probs),
            class_probabilities: self
                .classes
                .iter()
                .map(|c| c.to_string())
                .zip(probs.iter().copied())
                .collect(),
        })
    }

    pub(crate) fn train(
        &mut self,
        features: &[FeatureVector],
        labels: &[String],
    ) -> Result<TrainingMetrics, PredictorError> {
        check_training_set(self.id, features, labels, self.dim)?;
        let encoded = labels
            .iter()
            .map(|label| {
                self.classes
                    .iter()
                    .position(|c| c == label)
                    .ok_or_else(|| PredictorError::InvalidLabel {
                        predictor: self.id.to_string(),
                        label: label.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows: Vec<Vec<f64>> = features.iter().map(|f| f.values().to_vec()).collect();
        let (mut network, metrics) =
            train_softmax(&rows, &encoded, self.classes.len(), TrainOptions::default());
        network.metadata = serde_json::json!({
            "predictor": self.id.as_str(),
            "classes": self.classes,
            "metrics": metrics,
            "trained_at": chrono::Utc::now().to_rfc3339(),
        });
        self.network = Some(network);
        Ok(metrics)
    }
}
