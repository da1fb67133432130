//! Next-scoring-team predictor (home / away / none). Only meaningful in play.

use super::{Classifier, FeatureVector, Prediction, Predictor};
use crate::domain::{MatchSnapshot, PredictorId};
use crate::error::PredictorError;
use crate::ml::{DenseNetwork, TrainingMetrics};

pub const NEXT_GOAL_CLASSES: &[&str] = &["home", "away", "none"];

pub const NEXT_GOAL_FEATURES: &[&str] = &[
    "minute",
    "home_score",
    "away_score",
    "home_attacks",
    "away_attacks",
    "home_dangerous_attacks",
    "away_dangerous_attacks",
    "home_shots_total",
    "away_shots_total",
    "home_shots_on_target",
    "away_shots_on_target",
    "home_corners",
    "away_corners",
    "home_fouls",
    "away_fouls",
    "home_yellow_cards",
    "away_yellow_cards",
    "home_red_cards",
    "away_red_cards",
    "home_possession",
    "away_possession",
    "home_odds",
    "away_odds",
    "draw_odds",
    "time_since_last_goal",
    "goals_in_match",
    "home_momentum",
    "away_momentum",
];

#[derive(Debug, Clone)]
pub struct NextGoalPredictor {
    classifier: Classifier,
}

impl Default for NextGoalPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl NextGoalPredictor {
    pub fn new() -> Self {
        Self {
            classifier: Classifier::new(
                PredictorId::NextGoal,
                NEXT_GOAL_CLASSES,
                NEXT_GOAL_FEATURES.len(),
            ),
        }
    }
}

impl Predictor for NextGoalPredictor {
    fn id(&self) -> PredictorId {
        PredictorId::NextGoal
    }

    fn feature_names(&self) -> &'static [&'static str] {
        NEXT_GOAL_FEATURES
    }

    fn prepare(&self, snapshot: &MatchSnapshot) -> Result<FeatureVector, PredictorError> {
        let (home, away) = (&snapshot.live.home, &snapshot.live.away);
        let values = vec![
            snapshot.minute as f64 / 90.0,
            snapshot.home_score as f64,
            snapshot.away_score as f64,
            home.attacks,
            away.attacks,
            home.dangerous_attacks,
            away.dangerous_attacks,
            home.shots_total,
            away.shots_total,
            home.shots_on_target,
            away.shots_on_target,
            home.corners,
            away.corners,
            home.fouls,
            away.fouls,
            home.yellow_cards,
            away.yellow_cards,
            home.red_cards,
            away.red_cards,
            home.possession / 100.0,
            away.possession / 100.0,
            snapshot.odds.home,
            snapshot.odds.away,
            snapshot.odds.draw,
            snapshot.live.minutes_since_last_goal / 90.0,
            snapshot.total_goals() as f64 / 10.0,
            home.momentum(),
            away.momentum(),
        ];
        FeatureVector::new(self.id(), values)
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError> {
        self.classifier.predict(features)
    }

    fn train(
        &mut self,
        features: &[FeatureVector],
        labels: &[String],
    ) -> Result<TrainingMetrics, PredictorError> {
        self.classifier.train(features, labels)
    }

    fn is_trained(&self) -> bool {
        self.classifier.network().is_some()
    }

    fn parameters(&self) -> Option<&DenseNetwork> {
        self.classifier.network()
    }

    fn load(&mut self, parameters: DenseNetwork) -> Result<(), PredictorError> {
        self.classifier.load(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchStatus;
    use chrono::Utc;

    fn live(minute: u32, home_pressure: f64, away_pressure: f64) -> MatchSnapshot {
        let mut s = MatchSnapshot::new("m2", "Ajax", "PSV", Utc::now());
        s.status = MatchStatus::Live;
        s.minute = minute;
        s.live.home.dangerous_attacks = home_pressure;
        s.live.home.shots_on_target = home_pressure / 4.0;
        s.live.away.dangerous_attacks = away_pressure;
        s.live.away.shots_on_target = away_pressure / 4.0;
        s.live.minutes_since_last_goal = minute as f64;
        s
    }

    #[test]
    fn prepare_normalizes_clock_and_possession() {
        let p = NextGoalPredictor::new();
        let mut s = live(45, 10.0, 2.0);
        s.home_score = 2;
        s.away_score = 1;
        s.live.home.possession = 60.0;
        let f = p.prepare(&s).unwrap();
        assert_eq!(f.len(), 28);
        assert_eq!(f.values()[0], 0.5);
        assert_eq!(f.values()[19], 0.6);
        assert!((f.values()[25] - 0.3).abs() < 1e-12);
        assert_eq!(f, p.prepare(&s).unwrap());
    }

    #[test]
    fn trained_model_follows_pressure() {
        let mut p = NextGoalPredictor::new();
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..15 {
            let m = 20 + i * 4;
            features.push(p.prepare(&live(m, 30.0 + i as f64, 2.0)).unwrap());
            labels.push("home".to_string());
            features.push(p.prepare(&live(m, 2.0, 30.0 + i as f64)).unwrap());
            labels.push("away".to_string());
            features.push(p.prepare(&live(m, 1.0, 1.0)).unwrap());
            labels.push("none".to_string());
        }
        p.train(&features, &labels).unwrap();

        let pred = p.predict(&p.prepare(&live(70, 40.0, 1.0)).unwrap()).unwrap();
        assert_eq!(pred.label, "home");
        assert_eq!(pred.class_probabilities.len(), 3);
    }

    #[test]
    fn rejects_wrong_parameter_shape() {
        let mut p = NextGoalPredictor::new();
        let winner_shaped = DenseNetwork {
            input_dim: 20,
            input_mean: None,
            input_std: None,
            layers: vec![crate::ml::DenseLayer::zeros(
                20,
                3,
                crate::ml::Activation::Softmax,
            )],
            metadata: serde_json::Value::Null,
        };
        assert!(p.load(winner_shaped).is_err());
        assert!(!p.is_trained());
    }
}
