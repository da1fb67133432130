//! Match store boundary.
//!
//! The real store (games, signals, model parameters) lives outside this
//! process; the pipeline only needs the reads and writes below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MatchSnapshot, PredictorId, Signal};
use crate::error::Result;
use crate::ml::DenseNetwork;

/// Hit rate over settled signals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub accuracy: f64,
    pub sample_size: u32,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_snapshot(&self, match_id: &str) -> Result<Option<MatchSnapshot>>;

    /// Insert or replace by match id, returns the number written
    async fn upsert_snapshots(&self, snapshots: Vec<MatchSnapshot>) -> Result<usize>;

    /// Matches flagged for analysis with a start time in `[from, to]`
    async fn analysis_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MatchSnapshot>>;

    async fn live_match_count(&self) -> Result<usize>;

    async fn insert_signal(&self, signal: &Signal) -> Result<()>;

    async fn signals_for_match(&self, match_id: &str) -> Result<Vec<Signal>>;

    async fn unsent_signals(&self) -> Result<Vec<Signal>>;

    async fn mark_signal_sent(&self, signal_id: &str, message_id: Option<String>) -> Result<()>;

    async fn settle_signal(&self, signal_id: &str, hit: bool) -> Result<()>;

    /// `None` when no signal of this predictor has been settled yet.
    /// Multi-leg signals are tracked under `predictor = None`.
    async fn track_record(&self, predictor: Option<PredictorId>) -> Result<Option<TrackRecord>>;

    async fn load_parameters(&self, predictor: PredictorId) -> Result<Option<DenseNetwork>>;

    async fn save_parameters(&self, predictor: PredictorId, parameters: &DenseNetwork)
        -> Result<()>;
}
