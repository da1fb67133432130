//! Keyed arena of predictors.
//!
//! Each predictor sits behind its own lock: predictions take a read lock,
//! training swaps parameters under a write lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{FeatureVector, NextGoalPredictor, OverUnderPredictor, Predictor, WinnerPredictor};
use crate::domain::{FeatureContribution, MatchSnapshot, PredictionResult, PredictorId};
use crate::error::{PredictorError, Result};
use crate::ml::TrainingMetrics;
use crate::persistence::{MatchStore, ModelRef, ModelRegistry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictorStatus {
    pub id: PredictorId,
    pub trained: bool,
    pub features: usize,
}

pub struct PredictorRegistry {
    predictors: BTreeMap<PredictorId, RwLock<Box<dyn Predictor>>>,
    store: Arc<dyn MatchStore>,
    models: Arc<dyn ModelRegistry>,
}

impl PredictorRegistry {
    /// Registry with the three match predictors, untrained
    pub fn new(store: Arc<dyn MatchStore>, models: Arc<dyn ModelRegistry>) -> Self {
        Self::with_predictors(
            vec![
                Box::new(WinnerPredictor::new()),
                Box::new(NextGoalPredictor::new()),
                Box::new(OverUnderPredictor::new()),
            ],
            store,
            models,
        )
    }

    pub fn with_predictors(
        predictors: Vec<Box<dyn Predictor>>,
        store: Arc<dyn MatchStore>,
        models: Arc<dyn ModelRegistry>,
    ) -> Self {
        let predictors = predictors
            .into_iter()
            .map(|p| (p.id(), RwLock::new(p)))
            .collect();
        Self {
            predictors,
            store,
            models,
        }
    }

    pub fn ids(&self) -> Vec<PredictorId> {
        self.predictors.keys().copied().collect()
    }

    /// Load persisted parameters for every predictor, returns how many loaded
    pub async fn load_persisted(&self) -> Result<usize> {
        let mut loaded = 0;
        for (id, slot) in &self.predictors {
            match self.store.load_parameters(*id).await? {
                Some(params) => match slot.write().await.load(params) {
                    Ok(()) => {
                        loaded += 1;
                        info!(predictor = %id, "Predictor parameters loaded");
                    }
                    Err(e) => warn!(predictor = %id, error = %e, "Ignoring stored parameters"),
                },
                None => debug!(predictor = %id, "No stored parameters"),
            }
        }
        Ok(loaded)
    }

    /// Feature row for a snapshot, as used for training
    pub async fn prepare(
        &self,
        id: PredictorId,
        snapshot: &MatchSnapshot,
    ) -> std::result::Result<Vec<f64>, PredictorError> {
        let slot = self
            .predictors
            .get(&id)
            .ok_or_else(|| PredictorError::NotTrained(id.to_string()))?;
        let features = slot.read().await.prepare(snapshot)?;
        Ok(features.values().to_vec())
    }

    /// prepare + predict + explain for one snapshot
    pub async fn predict(
        &self,
        id: PredictorId,
        snapshot: &MatchSnapshot,
    ) -> std::result::Result<PredictionResult, PredictorError> {
        let slot = self
            .predictors
            .get(&id)
            .ok_or_else(|| PredictorError::NotTrained(id.to_string()))?;
        let predictor = slot.read().await;
        let features = predictor.prepare(snapshot)?;
        let prediction = predictor.predict(&features)?;
        let explanation = predictor.explain(&prediction);

        Ok(PredictionResult {
            predictor_id: id,
            label: prediction.label,
            probability: prediction.probability.clamp(0.0, 1.0),
            confidence: prediction.confidence.clamp(0.0, 1.0),
            explanation,
        })
    }

    /// Train, persist the parameters and register the model
    pub async fn train(
        &self,
        id: PredictorId,
        rows: Vec<Vec<f64>>,
        labels: Vec<String>,
    ) -> Result<(TrainingMetrics, ModelRef)> {
        let slot = self
            .predictors
            .get(&id)
            .ok_or_else(|| PredictorError::NotTrained(id.to_string()))?;

        let features = rows
            .into_iter()
            .map(|row| FeatureVector::new(id, row))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let (metrics, parameters) = {
            let mut predictor = slot.write().await;
            let metrics = predictor.train(&features, &labels)?;
            let parameters = predictor
                .parameters()
                .cloned()
                .ok_or_else(|| PredictorError::NotTrained(id.to_string()))?;
            (metrics, parameters)
        };

        self.store.save_parameters(id, &parameters).await?;
        let model_ref = self.models.register(id, &parameters, &metrics).await?;
        info!(
            predictor = %id,
            samples = metrics.samples,
            accuracy = ?metrics.accuracy,
            version = model_ref.version,
            "Predictor trained"
        );
        Ok((metrics, model_ref))
    }

    pub async fn status(&self) -> Vec<PredictorStatus> {
        let mut out = Vec::with_capacity(self.predictors.len());
        for (id, slot) in &self.predictors {
            let predictor = slot.read().await;
            out.push(PredictorStatus {
                id: *id,
                trained: predictor.is_trained(),
                features: predictor.feature_names().len(),
            });
        }
        out
    }

    pub async fn feature_importance(&self, id: PredictorId) -> Vec<FeatureContribution> {
        match self.predictors.get(&id) {
            Some(slot) => slot.read().await.feature_importance(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryStore, LocalModelRegistry};
    use chrono::Utc;

    fn registry() -> (PredictorRegistry, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let registry = PredictorRegistry::new(store.clone(), Arc::new(LocalModelRegistry::in_memory()));
        (registry, store)
    }

    #[tokio::test]
    async fn untrained_predictor_is_skippable() {
        let (registry, _) = registry();
        let snapshot = MatchSnapshot::new("m1", "A", "B", Utc::now());
        let err = registry
            .predict(PredictorId::Winner, &snapshot)
            .await
            .unwrap_err();
        assert!(err.is_skippable());
    }

    #[tokio::test]
    async fn training_persists_and_registers() {
        let (registry, store) = registry();
        let predictor = WinnerPredictor::new();
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (i, label) in ["1", "X", "2"].iter().cycle().take(12).enumerate() {
            let mut s = MatchSnapshot::new("t", "A", "B", Utc::now());
            s.home.elo = 1500.0 + (i as f64) * 10.0;
            rows.push(predictor.prepare(&s).unwrap().values().to_vec());
            labels.push(label.to_string());
        }

        let (metrics, model_ref) = registry
            .train(PredictorId::Winner, rows, labels)
            .await
            .unwrap();
        assert_eq!(metrics.samples, 12);
        assert_eq!(model_ref.version, 1);
        assert!(store
            .load_parameters(PredictorId::Winner)
            .await
            .unwrap()
            .is_some());

        let status = registry.status().await;
        let winner = status.iter().find(|s| s.id == PredictorId::Winner).unwrap();
        assert!(winner.trained);
        assert_eq!(winner.features, 20);

        let snapshot = MatchSnapshot::new("m1", "A", "B", Utc::now());
        let result = registry.predict(PredictorId::Winner, &snapshot).await.unwrap();
        assert!(!result.explanation.text.is_empty());
    }

    #[tokio::test]
    async fn empty_training_set_surfaces() {
        let (registry, _) = registry();
        let err = registry
            .train(PredictorId::OverUnder, vec![], vec![])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Empty training dataset"));
    }

    #[tokio::test]
    async fn reloads_parameters_from_store() {
        let (trained, store) = registry();
        let p = OverUnderPredictor::new();
        let rows: Vec<Vec<f64>> = (0..6)
            .map(|i| {
                let mut s = MatchSnapshot::new("t", "A", "B", Utc::now());
                s.home.goals_scored_avg = 1.0 + i as f64 * 0.4;
                p.prepare(&s).unwrap().values().to_vec()
            })
            .collect();
        let labels = (0..6).map(|i| (1 + i / 2).to_string()).collect();
        trained.train(PredictorId::OverUnder, rows, labels).await.unwrap();

        let fresh = PredictorRegistry::new(store, Arc::new(LocalModelRegistry::in_memory()));
        assert_eq!(fresh.load_persisted().await.unwrap(), 1);
    }
}
