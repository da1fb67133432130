//! Packages an accepted candidate into a `Signal`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::combiner::{Candidate, CandidateKind};
use crate::domain::{MatchSnapshot, Selection, Signal};

#[derive(Debug, Clone, Default)]
pub struct SignalEmitter;

impl SignalEmitter {
    pub fn new() -> Self {
        Self
    }

    /// `sig_<yyyymmdd_HHMMSS>_<8 hex>`
    pub fn signal_id(now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("sig_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
    }

    pub fn emit(
        &self,
        snapshot: &MatchSnapshot,
        candidate: &Candidate,
        now: DateTime<Utc>,
    ) -> Signal {
        let assessment = &candidate.assessment;
        let (probability, legs) = match &candidate.kind {
            CandidateKind::Single { prediction } => (
                prediction.probability,
                vec![Selection {
                    market_type: prediction.market(),
                    outcome: prediction.label.clone(),
                    odds: candidate.odds,
                    probability: prediction.probability,
                    confidence: prediction.confidence,
                }],
            ),
            CandidateKind::Combination { combination } => {
                (combination.win_rate, combination.selections.clone())
            }
        };

        let mut signal = Signal {
            id: Self::signal_id(now),
            match_id: snapshot.id.clone(),
            predictor_id: candidate.predictor_id(),
            prediction: candidate.label(),
            probability,
            confidence: assessment.confidence,
            expected_value: assessment.expected_value,
            stake_fraction: assessment.kelly_fraction,
            odds: candidate.odds,
            legs,
            message: String::new(),
            created_at: now,
            sent: false,
            message_id: None,
            hit: None,
        };
        signal.message = render_message(snapshot, &signal);
        signal
    }
}

/// Notification text for a signal
pub fn render_message(snapshot: &MatchSnapshot, signal: &Signal) -> String {
    let header = if signal.expected_value > 0.10 {
        "🔥 Value signal"
    } else {
        "✅ Signal"
    };
    let mut lines = vec![
        header.to_string(),
        format!("⚽ {}", snapshot.fixture()),
    ];
    if !snapshot.league.is_empty() {
        lines.push(format!("🏆 {}", snapshot.league));
    }
    if snapshot.is_live() {
        lines.push(format!(
            "⏰ {}' ({}-{})",
            snapshot.minute, snapshot.home_score, snapshot.away_score
        ));
    }
    if signal.is_multi_leg() {
        lines.push(format!("🎯 Multiple @ {:.2}", signal.odds));
        for leg in &signal.legs {
            lines.push(format!("  • {} @ {:.2}", leg.label(), leg.odds));
        }
    } else {
        let source = signal
            .predictor_id
            .map(|p| p.to_string())
            .unwrap_or_else(|| "multiple".to_string());
        lines.push(format!("🎯 {} @ {:.2} ({})", signal.prediction, signal.odds, source));
    }
    lines.push(format!("📊 Confidence: {:.0}%", signal.confidence * 100.0));
    lines.push(format!(
        "💰 EV: {:+.1}% | Stake: {:.1}%",
        signal.expected_value * 100.0,
        signal.stake_fraction * 100.0
    ));
    lines.join("\n")
}
