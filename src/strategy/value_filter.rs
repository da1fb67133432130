//! Expected-value / Kelly gate in front of every signal.
//!
//! Pure and stateless: an assessment is recomputed on every call and a
//! rejection only lists reasons, it never fails the cycle.

use serde::{Deserialize, Serialize};

use crate::config::ValueFilterConfig;
use crate::domain::{
    CompetitionInfo, CompetitionTier, MarketMetadata, RejectReason, ValueAssessment, ValueTier,
};
use crate::persistence::TrackRecord;

/// Bookmaker-implied probability, clamped to [0.05, 0.95]
pub fn implied_probability(odds: f64) -> f64 {
    if odds <= 0.0 || !odds.is_finite() {
        return 0.95;
    }
    (1.0 / odds).clamp(0.05, 0.95)
}

/// Net return per unit staked: p·(o−1) − (1−p)
pub fn expected_value(probability: f64, odds: f64) -> f64 {
    probability * (odds - 1.0) - (1.0 - probability)
}

/// Unclamped Kelly fraction ((o−1)p − (1−p)) / (o−1); zero when odds pay nothing
pub fn raw_kelly(probability: f64, odds: f64) -> f64 {
    let b = odds - 1.0;
    if b <= 0.0 {
        return 0.0;
    }
    (b * probability - (1.0 - probability)) / b
}

/// Kelly fraction clamped to [0, max_kelly]
pub fn kelly_fraction(probability: f64, odds: f64, max_kelly: f64) -> f64 {
    raw_kelly(probability, odds).clamp(0.0, max_kelly)
}

/// Relative edge over the implied probability
pub fn value_score(probability: f64, odds: f64) -> f64 {
    let implied = implied_probability(odds);
    (probability - implied) / implied
}

/// Sum of market-quality penalties, clamped to [0, 1]
pub fn risk_score(market: &MarketMetadata, competition: &CompetitionInfo, sample_size: u32) -> f64 {
    let mut risk = 0.0;
    if market.volume < 500.0 {
        risk += 0.2;
    }
    if market.odds_movement.abs() > 0.2 {
        risk += 0.3;
    }
    if competition.tier == CompetitionTier::Amateur {
        risk += 0.2;
    }
    if competition.market_efficiency < 0.6 {
        risk += 0.1;
    }
    if sample_size < 100 {
        risk += 0.1;
    }
    f64::min(risk, 1.0)
}

/// Everything the filter looks at for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueInput {
    pub probability: f64,
    pub odds: f64,
    pub confidence: f64,
    pub track_record: TrackRecord,
    pub market: MarketMetadata,
    pub competition: CompetitionInfo,
}

#[derive(Debug, Clone, Default)]
pub struct ValueFilter {
    config: ValueFilterConfig,
}

impl ValueFilter {
    pub fn new(config: ValueFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValueFilterConfig {
        &self.config
    }

    pub fn assess(&self, input: &ValueInput) -> ValueAssessment {
        let cfg = &self.config;
        let p = input.probability.clamp(0.0, 1.0);
        let odds = input.odds;

        let implied = implied_probability(odds);
        let ev = expected_value(p, odds);
        let kelly = kelly_fraction(p, odds, cfg.max_kelly);
        let score = value_score(p, odds);
        let risk = risk_score(&input.market, &input.competition, input.track_record.sample_size);
        let record = input.track_record;

        let mut reasons = Vec::new();
        if ev < cfg.min_expected_value {
            reasons.push(RejectReason::LowExpectedValue);
        }
        if input.confidence < cfg.min_confidence {
            reasons.push(RejectReason::LowConfidence);
        }
        if record.sample_size < cfg.min_sample_size {
            reasons.push(RejectReason::SmallSample);
        }
        if !(kelly > 0.0 && kelly <= cfg.max_kelly) {
            reasons.push(RejectReason::KellyOutOfRange);
        }
        if risk > cfg.max_risk_score {
            reasons.push(RejectReason::HighRisk);
        }
        if record.accuracy < cfg.min_historical_accuracy {
            reasons.push(RejectReason::LowHistoricalAccuracy);
        }

        let blended = (0.4 * input.confidence
            + 0.3 * record.accuracy
            + 0.2 * (record.sample_size as f64 / 200.0).min(1.0)
            + 0.1 * (score / 0.2).min(1.0))
        .clamp(0.05, 0.95);

        let tier = if ev > 0.10 {
            ValueTier::High
        } else if ev > cfg.min_expected_value {
            ValueTier::Medium
        } else {
            ValueTier::None
        };

        ValueAssessment {
            is_value_bet: reasons.is_empty(),
            probability: p,
            odds,
            implied_probability: implied,
            expected_value: ev,
            kelly_fraction: kelly,
            confidence: input.confidence,
            blended_confidence: blended,
            value_score: score,
            risk_score: risk,
            tier,
            reject_reasons: reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(probability: f64, odds: f64, confidence: f64) -> ValueInput {
        ValueInput {
            probability,
            odds,
            confidence,
            track_record: TrackRecord {
                accuracy: 0.6,
                sample_size: 80,
            },
            market: MarketMetadata::default(),
            competition: CompetitionInfo::default(),
        }
    }

    #[test]
    fn expected_value_formula() {
        assert!((expected_value(0.6, 2.0) - 0.20).abs() < 1e-12);
        assert!((expected_value(0.0, 3.0) + 1.0).abs() < 1e-12);
        assert!((expected_value(1.0, 3.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn kelly_is_clamped() {
        assert!((kelly_fraction(0.6, 2.0, 0.25) - 0.20).abs() < 1e-12);
        assert_eq!(kelly_fraction(0.9, 2.0, 0.25), 0.25);
        assert_eq!(kelly_fraction(0.2, 2.0, 0.25), 0.0);
        assert_eq!(kelly_fraction(0.9, 1.0, 0.25), 0.0);
    }

    #[test]
    fn implied_probability_is_clamped() {
        assert!((implied_probability(1.5) - 0.6667).abs() < 1e-3);
        assert_eq!(implied_probability(50.0), 0.05);
        assert_eq!(implied_probability(1.01), 0.95);
    }

    #[test]
    fn low_confidence_is_rejected_regardless_of_ev() {
        let filter = ValueFilter::default();
        let assessment = filter.assess(&input(0.8, 3.0, 0.50));
        assert!(assessment.expected_value > 1.0);
        assert!(!assessment.is_value_bet);
        assert!(assessment.rejected_for(RejectReason::LowConfidence));
    }

    #[test]
    fn strong_home_pick_is_accepted() {
        let filter = ValueFilter::default();
        let assessment = filter.assess(&input(0.65, 2.1, 0.65));
        assert!(assessment.is_value_bet, "{:?}", assessment.reject_reasons);
        assert!((assessment.expected_value - 0.365).abs() < 1e-9);
        assert_eq!(assessment.kelly_fraction, 0.25);
        assert!((assessment.risk_score - 0.1).abs() < 1e-12);
        assert_eq!(assessment.tier, ValueTier::High);
    }

    #[test]
    fn every_failed_criterion_is_listed() {
        let filter = ValueFilter::default();
        let mut bad = input(0.3, 2.0, 0.4);
        bad.track_record = TrackRecord {
            accuracy: 0.4,
            sample_size: 10,
        };
        bad.market.volume = 100.0;
        bad.market.odds_movement = -0.4;
        bad.competition.tier = CompetitionTier::Amateur;
        bad.competition.market_efficiency = 0.3;

        let assessment = filter.assess(&bad);
        assert_eq!(assessment.reject_reasons.len(), 6);
        assert_eq!(assessment.tier, ValueTier::None);
        assert!((assessment.risk_score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn risk_score_caps_at_one() {
        let market = MarketMetadata {
            volume: 0.0,
            odds_movement: 1.0,
            bookmaker_margin: 0.1,
        };
        let competition = CompetitionInfo {
            tier: CompetitionTier::Amateur,
            market_efficiency: 0.0,
        };
        assert!((risk_score(&market, &competition, 0) - 0.9).abs() < 1e-12);
        assert!(risk_score(&market, &competition, 0) <= 1.0);
    }
}
