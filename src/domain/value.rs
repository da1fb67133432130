use serde::{Deserialize, Serialize};

/// Why a candidate failed the value filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    LowExpectedValue,
    LowConfidence,
    SmallSample,
    KellyOutOfRange,
    HighRisk,
    LowHistoricalAccuracy,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::LowExpectedValue => "low_expected_value",
            RejectReason::LowConfidence => "low_confidence",
            RejectReason::SmallSample => "small_sample",
            RejectReason::KellyOutOfRange => "kelly_out_of_range",
            RejectReason::HighRisk => "high_risk",
            RejectReason::LowHistoricalAccuracy => "low_historical_accuracy",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTier {
    High,
    Medium,
    None,
}

impl ValueTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueTier::High => "high_value",
            ValueTier::Medium => "medium_value",
            ValueTier::None => "no_value",
        }
    }
}

/// Stateless result of the value filter, recomputed on every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAssessment {
    pub is_value_bet: bool,
    pub probability: f64,
    pub odds: f64,
    pub implied_probability: f64,
    pub expected_value: f64,
    /// Clamped to [0, max_kelly]
    pub kelly_fraction: f64,
    /// Model confidence the gate was applied to
    pub confidence: f64,
    /// Blend of model confidence, track record and edge
    pub blended_confidence: f64,
    pub value_score: f64,
    pub risk_score: f64,
    pub tier: ValueTier,
    pub reject_reasons: Vec<RejectReason>,
}

impl ValueAssessment {
    pub fn rejected_for(&self, reason: RejectReason) -> bool {
        self.reject_reasons.contains(&reason)
    }
}
