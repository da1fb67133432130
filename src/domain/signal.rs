use super::prediction::{PredictorId, Selection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emitted betting recommendation.
///
/// Created once by the emitter. `sent`, `message_id` and `hit` are only ever
/// changed afterwards by dispatch and settlement, never by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub match_id: String,
    /// `None` for a multi-leg signal
    pub predictor_id: Option<PredictorId>,
    /// Pick label, e.g. "1" or "match_result:1 + total_goals:over_2.5"
    pub prediction: String,
    pub probability: f64,
    pub confidence: f64,
    pub expected_value: f64,
    pub stake_fraction: f64,
    pub odds: f64,
    pub legs: Vec<Selection>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub sent: bool,
    pub message_id: Option<String>,
    pub hit: Option<bool>,
}

impl Signal {
    pub fn is_multi_leg(&self) -> bool {
        self.legs.len() > 1
    }

    pub fn is_settled(&self) -> bool {
        self.hit.is_some()
    }
}
