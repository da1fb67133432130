//! Decision combiner: runs the predictors for one match and gates the
//! resulting candidates through the multi-leg generator and value filter.
//!
//! Holds no state across cycles.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::multi_leg::{candidate_selections, MultiLegGenerator};
use super::value_filter::{ValueFilter, ValueInput};
use crate::config::PipelineConfig;
use crate::domain::{
    MatchSnapshot, PredictionResult, PredictorId, StrategyCombination, ValueAssessment,
};
use crate::error::Result;
use crate::persistence::{MatchStore, TrackRecord};
use crate::predictors::PredictorRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateKind {
    Single { prediction: PredictionResult },
    Combination { combination: StrategyCombination },
}

/// A priced pick together with its value assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub kind: CandidateKind,
    pub odds: f64,
    pub assessment: ValueAssessment,
}

impl Candidate {
    pub fn label(&self) -> String {
        match &self.kind {
            CandidateKind::Single { prediction } => prediction.label.clone(),
            CandidateKind::Combination { combination } => combination.label(),
        }
    }

    pub fn predictor_id(&self) -> Option<PredictorId> {
        match &self.kind {
            CandidateKind::Single { prediction } => Some(prediction.predictor_id),
            CandidateKind::Combination { .. } => None,
        }
    }

    fn is_acceptable(&self) -> bool {
        let eligible = match &self.kind {
            CandidateKind::Single { .. } => true,
            CandidateKind::Combination { combination } => combination.eligible,
        };
        eligible && self.assessment.is_value_bet
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPredictor {
    pub predictor_id: PredictorId,
    pub reason: String,
}

/// Everything one cycle produced for one match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub match_id: String,
    pub predictions: Vec<PredictionResult>,
    pub skipped: Vec<SkippedPredictor>,
    pub single: Option<Candidate>,
    pub combination: Option<Candidate>,
}

impl Decision {
    /// The combination when it is eligible and passes, else the passing single
    pub fn accepted(&self) -> Option<&Candidate> {
        self.combination
            .as_ref()
            .filter(|c| c.is_acceptable())
            .or_else(|| self.single.as_ref().filter(|c| c.is_acceptable()))
    }
}

pub struct DecisionCombiner {
    registry: Arc<PredictorRegistry>,
    store: Arc<dyn MatchStore>,
    generator: MultiLegGenerator,
    filter: ValueFilter,
    priors: PipelineConfig,
}

impl DecisionCombiner {
    pub fn new(
        registry: Arc<PredictorRegistry>,
        store: Arc<dyn MatchStore>,
        generator: MultiLegGenerator,
        filter: ValueFilter,
        priors: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            store,
            generator,
            filter,
            priors,
        }
    }

    pub async fn decide(&self, snapshot: &MatchSnapshot) -> Result<Decision> {
        let mut predictions = Vec::new();
        let mut skipped = Vec::new();

        // Sequential: the live gate decides whether next-goal runs at all
        for id in [PredictorId::Winner, PredictorId::NextGoal, PredictorId::OverUnder] {
            if id == PredictorId::NextGoal && !snapshot.is_live() {
                continue;
            }
            match self.registry.predict(id, snapshot).await {
                Ok(result) => predictions.push(result),
                Err(e) => {
                    if e.is_skippable() {
                        debug!(match_id = %snapshot.id, predictor = %id, error = %e, "Predictor skipped");
                    } else {
                        warn!(match_id = %snapshot.id, predictor = %id, error = %e, "Predictor failed");
                    }
                    skipped.push(SkippedPredictor {
                        predictor_id: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let single = self.assess_best_single(snapshot, &predictions).await?;

        let combination = if predictions.len() >= 2 {
            let legs = candidate_selections(
                &predictions,
                &snapshot.odds,
                self.generator.config().min_leg_confidence,
            );
            match self.generator.generate(&legs) {
                Some(combination) => Some(self.assess_combination(snapshot, combination).await?),
                None => None,
            }
        } else {
            None
        };

        Ok(Decision {
            match_id: snapshot.id.clone(),
            predictions,
            skipped,
            single,
            combination,
        })
    }

    async fn assess_best_single(
        &self,
        snapshot: &MatchSnapshot,
        predictions: &[PredictionResult],
    ) -> Result<Option<Candidate>> {
        let best = predictions
            .iter()
            .filter_map(|p| {
                snapshot
                    .odds
                    .price_for(p.market(), &p.label)
                    .map(|odds| (p, odds))
            })
            .max_by(|(a, _), (b, _)| a.confidence.total_cmp(&b.confidence));

        let Some((prediction, odds)) = best else {
            return Ok(None);
        };

        let input = ValueInput {
            probability: prediction.probability,
            odds,
            confidence: prediction.confidence,
            track_record: self.track_record(Some(prediction.predictor_id)).await?,
            market: snapshot.market.clone(),
            competition: snapshot.competition.clone(),
        };
        Ok(Some(Candidate {
            kind: CandidateKind::Single {
                prediction: prediction.clone(),
            },
            odds,
            assessment: self.filter.assess(&input),
        }))
    }

    async fn assess_combination(
        &self,
        snapshot: &MatchSnapshot,
        combination: StrategyCombination,
    ) -> Result<Candidate> {
        let input = ValueInput {
            probability: combination.win_rate,
            odds: combination.combined_odds,
            confidence: combination.mean_confidence,
            track_record: self.track_record(None).await?,
            market: snapshot.market.clone(),
            competition: snapshot.competition.clone(),
        };
        let assessment = self.filter.assess(&input);
        Ok(Candidate {
            odds: combination.combined_odds,
            kind: CandidateKind::Combination { combination },
            assessment,
        })
    }

    async fn track_record(&self, predictor: Option<PredictorId>) -> Result<TrackRecord> {
        Ok(self
            .store
            .track_record(predictor)
            .await?
            .unwrap_or(TrackRecord {
                accuracy: self.priors.prior_accuracy,
                sample_size: self.priors.prior_sample_size,
            }))
    }
}
