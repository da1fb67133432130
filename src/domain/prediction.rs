use super::market::MarketType;
use serde::{Deserialize, Serialize};

/// Identity of a predictor in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorId {
    Winner,
    NextGoal,
    OverUnder,
}

impl PredictorId {
    pub const ALL: [PredictorId; 3] = [
        PredictorId::Winner,
        PredictorId::NextGoal,
        PredictorId::OverUnder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictorId::Winner => "winner",
            PredictorId::NextGoal => "next_goal",
            PredictorId::OverUnder => "over_under",
        }
    }

    pub fn market(&self) -> MarketType {
        match self {
            PredictorId::Winner => MarketType::MatchResult,
            PredictorId::NextGoal => MarketType::NextGoal,
            PredictorId::OverUnder => MarketType::TotalGoals,
        }
    }
}

impl std::fmt::Display for PredictorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PredictorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "winner" => Ok(PredictorId::Winner),
            "next_goal" => Ok(PredictorId::NextGoal),
            "over_under" => Ok(PredictorId::OverUnder),
            other => Err(format!("unknown predictor: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub name: String,
    pub importance: f64,
}

/// Human-readable account of a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Explanation {
    pub features: Vec<FeatureContribution>,
    pub text: String,
}

/// Output of one predictor for one match, scoped to one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictor_id: PredictorId,
    pub label: String,
    /// Probability of `label`
    pub probability: f64,
    /// Gap between top-1 and top-2 class probability
    pub confidence: f64,
    pub explanation: Explanation,
}

impl PredictionResult {
    pub fn market(&self) -> MarketType {
        self.predictor_id.market()
    }
}

/// One leg of a bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub market_type: MarketType,
    pub outcome: String,
    pub odds: f64,
    pub probability: f64,
    pub confidence: f64,
}

impl Selection {
    /// Two legs conflict when they assert different outcomes of the same market
    pub fn conflicts_with(&self, other: &Selection) -> bool {
        self.market_type == other.market_type && self.outcome != other.outcome
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.market_type, self.outcome)
    }
}

/// 2..=4 non-conflicting legs scored by simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCombination {
    /// Name of the risk tier that admitted the combination
    pub tier: String,
    pub selections: Vec<Selection>,
    pub combined_odds: f64,
    pub win_rate: f64,
    pub expected_value: f64,
    pub risk_score: f64,
    pub mean_confidence: f64,
    /// False when no candidate cleared the expected-value bar
    pub eligible: bool,
}

impl StrategyCombination {
    pub fn label(&self) -> String {
        self.selections
            .iter()
            .map(Selection::label)
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(market: MarketType, outcome: &str) -> Selection {
        Selection {
            market_type: market,
            outcome: outcome.to_string(),
            odds: 2.0,
            probability: 0.6,
            confidence: 0.6,
        }
    }

    #[test]
    fn same_market_different_outcome_conflicts() {
        let home = leg(MarketType::MatchResult, "1");
        let away = leg(MarketType::MatchResult, "2");
        let over = leg(MarketType::TotalGoals, "over_2.5");
        assert!(home.conflicts_with(&away));
        assert!(!home.conflicts_with(&home.clone()));
        assert!(!home.conflicts_with(&over));
    }

    #[test]
    fn predictor_id_round_trips_through_str() {
        for id in PredictorId::ALL {
            assert_eq!(id.as_str().parse::<PredictorId>().unwrap(), id);
        }
        assert!("multiple".parse::<PredictorId>().is_err());
    }
}
