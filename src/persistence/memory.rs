//! Process-local `MatchStore`.
//!
//! Snapshots and signals live in memory for the process lifetime. Predictor
//! parameters are additionally written as `<dir>/<predictor>.json` when a
//! parameter directory is configured, so a restart can reload them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::store::{MatchStore, TrackRecord};
use crate::domain::{MatchSnapshot, MatchStatus, PredictorId, Signal};
use crate::error::{BetSignalError, Result};
use crate::ml::DenseNetwork;

#[derive(Default)]
pub struct InMemoryStore {
    snapshots: RwLock<HashMap<String, MatchSnapshot>>,
    signals: RwLock<Vec<Signal>>,
    parameters: RwLock<HashMap<PredictorId, DenseNetwork>>,
    parameters_dir: Option<PathBuf>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            parameters_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    fn parameters_path(&self, predictor: PredictorId) -> Option<PathBuf> {
        self.parameters_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", predictor.as_str())))
    }

    pub async fn signal_count(&self) -> usize {
        self.signals.read().await.len()
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn get_snapshot(&self, match_id: &str) -> Result<Option<MatchSnapshot>> {
        Ok(self.snapshots.read().await.get(match_id).cloned())
    }

    async fn upsert_snapshots(&self, snapshots: Vec<MatchSnapshot>) -> Result<usize> {
        let mut guard = self.snapshots.write().await;
        let count = snapshots.len();
        for snapshot in snapshots {
            guard.insert(snapshot.id.clone(), snapshot);
        }
        Ok(count)
    }

    async fn analysis_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MatchSnapshot>> {
        let mut candidates: Vec<MatchSnapshot> = self
            .snapshots
            .read()
            .await
            .values()
            .filter(|s| {
                s.include_for_analysis
                    && s.status != MatchStatus::Finished
                    && s.start_time >= from
                    && s.start_time <= to
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(candidates)
    }

    async fn live_match_count(&self) -> Result<usize> {
        Ok(self
            .snapshots
            .read()
            .await
            .values()
            .filter(|s| s.is_live())
            .count())
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<()> {
        let mut guard = self.signals.write().await;
        if guard.iter().any(|s| s.id == signal.id) {
            return Err(BetSignalError::Store(format!(
                "duplicate signal id {}",
                signal.id
            )));
        }
        guard.push(signal.clone());
        Ok(())
    }

    async fn signals_for_match(&self, match_id: &str) -> Result<Vec<Signal>> {
        Ok(self
            .signals
            .read()
            .await
            .iter()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn unsent_signals(&self) -> Result<Vec<Signal>> {
        Ok(self
            .signals
            .read()
            .await
            .iter()
            .filter(|s| !s.sent)
            .cloned()
            .collect())
    }

    async fn mark_signal_sent(&self, signal_id: &str, message_id: Option<String>) -> Result<()> {
        let mut guard = self.signals.write().await;
        let signal = guard
            .iter_mut()
            .find(|s| s.id == signal_id)
            .ok_or_else(|| BetSignalError::Store(format!("unknown signal {signal_id}")))?;
        signal.sent = true;
        signal.message_id = message_id;
        Ok(())
    }

    async fn settle_signal(&self, signal_id: &str, hit: bool) -> Result<()> {
        let mut guard = self.signals.write().await;
        let signal = guard
            .iter_mut()
            .find(|s| s.id == signal_id)
            .ok_or_else(|| BetSignalError::Store(format!("unknown signal {signal_id}")))?;
        signal.hit = Some(hit);
        Ok(())
    }

    async fn track_record(&self, predictor: Option<PredictorId>) -> Result<Option<TrackRecord>> {
        let guard = self.signals.read().await;
        let settled: Vec<bool> = guard
            .iter()
            .filter(|s| s.predictor_id == predictor)
            .filter_map(|s| s.hit)
            .collect();
        if settled.is_empty() {
            return Ok(None);
        }
        let hits = settled.iter().filter(|h| **h).count();
        Ok(Some(TrackRecord {
            accuracy: hits as f64 / settled.len() as f64,
            sample_size: settled.len() as u32,
        }))
    }

    async fn load_parameters(&self, predictor: PredictorId) -> Result<Option<DenseNetwork>> {
        if let Some(params) = self.parameters.read().await.get(&predictor) {
            return Ok(Some(params.clone()));
        }
        let Some(path) = self.parameters_path(predictor) else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let params = DenseNetwork::from_json(&content)?;
        debug!(predictor = %predictor, path = %path.display(), "Loaded predictor parameters");
        self.parameters
            .write()
            .await
            .insert(predictor, params.clone());
        Ok(Some(params))
    }

    async fn save_parameters(
        &self,
        predictor: PredictorId,
        parameters: &DenseNetwork,
    ) -> Result<()> {
        if let Some(path) = self.parameters_path(predictor) {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, serde_json::to_vec_pretty(parameters)?).await?;
            info!(predictor = %predictor, path = %path.display(), "Saved predictor parameters");
        }
        self.parameters
            .write()
            .await
            .insert(predictor, parameters.clone());
        Ok(())
    }
}
