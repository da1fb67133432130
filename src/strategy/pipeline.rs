use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::combiner::{Decision, DecisionCombiner};
use super::emitter::SignalEmitter;
use crate::domain::{MatchSnapshot, Signal};
use crate::error::{BetSignalError, Result};
use crate::persistence::MatchStore;

/// Outcome of evaluating one snapshot without persisting anything
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    pub signal: Option<Signal>,
}

/// Snapshot in, at most one signal out
pub struct SignalPipeline {
    store: Arc<dyn MatchStore>,
    combiner: DecisionCombiner,
    emitter: SignalEmitter,
}

impl SignalPipeline {
    pub fn new(store: Arc<dyn MatchStore>, combiner: DecisionCombiner) -> Self {
        Self {
            store,
            combiner,
            emitter: SignalEmitter::new(),
        }
    }

    pub async fn evaluate(&self, snapshot: &MatchSnapshot) -> Result<Evaluation> {
        let decision = self.combiner.decide(snapshot).await?;
        let signal = decision
            .accepted()
            .map(|candidate| self.emitter.emit(snapshot, candidate, Utc::now()));
        Ok(Evaluation { decision, signal })
    }

    /// Run one analysis cycle for a stored match and persist the signal, if any.
    ///
    /// A pick identical to one already signalled for this match yields `None`.
    pub async fn run_cycle(&self, match_id: &str) -> Result<Option<Signal>> {
        let snapshot = self
            .store
            .get_snapshot(match_id)
            .await?
            .ok_or_else(|| BetSignalError::MatchNotFound(match_id.to_string()))?;

        let evaluation = self.evaluate(&snapshot).await?;
        let Some(signal) = evaluation.signal else {
            debug!(
                match_id,
                predictions = evaluation.decision.predictions.len(),
                skipped = evaluation.decision.skipped.len(),
                "No signal"
            );
            return Ok(None);
        };

        let existing = self.store.signals_for_match(match_id).await?;
        if existing.iter().any(|s| s.prediction == signal.prediction) {
            debug!(match_id, prediction = %signal.prediction, "Pick already signalled");
            return Ok(None);
        }

        self.store.insert_signal(&signal).await?;
        info!(
            match_id,
            signal_id = %signal.id,
            prediction = %signal.prediction,
            ev = signal.expected_value,
            stake = signal.stake_fraction,
            "Signal emitted"
        );
        Ok(Some(signal))
    }
}
