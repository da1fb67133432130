//! Model registry boundary and a local directory-backed implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::PredictorId;
use crate::error::Result;
use crate::ml::{DenseNetwork, TrainingMetrics};

/// Handle returned after registering a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    pub predictor_id: PredictorId,
    pub version: u32,
    pub uri: String,
    pub registered_at: DateTime<Utc>,
}

#[async_trait]
pub trait ModelRegistry: Send + Sync {
    async fn register(
        &self,
        predictor: PredictorId,
        parameters: &DenseNetwork,
        metrics: &TrainingMetrics,
    ) -> Result<ModelRef>;

    async fn latest(&self, predictor: PredictorId) -> Result<Option<ModelRef>>;
}

#[derive(Serialize)]
struct RegisteredModel<'a> {
    predictor: PredictorId,
    version: u32,
    metrics: &'a TrainingMetrics,
    parameters: &'a DenseNetwork,
    registered_at: DateTime<Utc>,
}

/// Writes `<root>/registry/<predictor>/v<N>.json`; `root = None` keeps refs in memory only
pub struct LocalModelRegistry {
    root: Option<PathBuf>,
    refs: Mutex<HashMap<PredictorId, Vec<ModelRef>>>,
}

impl LocalModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            refs: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            root: None,
            refs: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ModelRegistry for LocalModelRegistry {
    async fn register(
        &self,
        predictor: PredictorId,
        parameters: &DenseNetwork,
        metrics: &TrainingMetrics,
    ) -> Result<ModelRef> {
        let mut refs = self.refs.lock().await;
        let history = refs.entry(predictor).or_default();
        let version = history.last().map(|r| r.version + 1).unwrap_or(1);
        let registered_at = Utc::now();

        let uri = match &self.root {
            Some(root) => {
                let dir = root.join("registry").join(predictor.as_str());
                tokio::fs::create_dir_all(&dir).await?;
                let path = dir.join(format!("v{version}.json"));
                let record = RegisteredModel {
                    predictor,
                    version,
                    metrics,
                    parameters,
                    registered_at,
                };
                tokio::fs::write(&path, serde_json::to_vec_pretty(&record)?).await?;
                format!("file://{}", path.display())
            }
            None => format!("memory://{}/v{version}", predictor.as_str()),
        };

        let model_ref = ModelRef {
            predictor_id: predictor,
            version,
            uri,
            registered_at,
        };
        info!(predictor = %predictor, version, uri = %model_ref.uri, "Registered model");
        history.push(model_ref.clone());
        Ok(model_ref)
    }

    async fn latest(&self, predictor: PredictorId) -> Result<Option<ModelRef>> {
        Ok(self
            .refs
            .lock()
            .await
            .get(&predictor)
            .and_then(|h| h.last().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{Activation, DenseLayer};

    fn params() -> DenseNetwork {
        DenseNetwork {
            input_dim: 2,
            input_mean: None,
            input_std: None,
            layers: vec![DenseLayer::zeros(2, 3, Activation::Softmax)],
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn versions_increase_per_predictor() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalModelRegistry::new(dir.path());
        let metrics = TrainingMetrics::default();

        let v1 = registry
            .register(PredictorId::Winner, &params(), &metrics)
            .await
            .unwrap();
        let v2 = registry
            .register(PredictorId::Winner, &params(), &metrics)
            .await
            .unwrap();
        let other = registry
            .register(PredictorId::NextGoal, &params(), &metrics)
            .await
            .unwrap();

        assert_eq!((v1.version, v2.version, other.version), (1, 2, 1));
        assert!(dir.path().join("registry/winner/v2.json").exists());
        assert_eq!(
            registry.latest(PredictorId::Winner).await.unwrap(),
            Some(v2)
        );
        assert!(registry
            .latest(PredictorId::OverUnder)
            .await
            .unwrap()
            .is_none());
    }
}
