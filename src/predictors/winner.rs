//! Full-time result (1 / X / 2) predictor.

use super::{form_score, Classifier, FeatureVector, Prediction, Predictor};
use crate::domain::{MatchSnapshot, PredictorId, TeamProfile};
use crate::error::PredictorError;
use crate::ml::{DenseNetwork, TrainingMetrics};

pub const WINNER_CLASSES: &[&str] = &["1", "X", "2"];

pub const WINNER_FEATURES: &[&str] = &[
    "home_odds",
    "draw_odds",
    "away_odds",
    "home_form",
    "away_form",
    "home_goals_scored_avg",
    "away_goals_scored_avg",
    "home_goals_conceded_avg",
    "away_goals_conceded_avg",
    "home_elo",
    "away_elo",
    "home_possession_avg",
    "away_possession_avg",
    "home_shots_on_target_avg",
    "away_shots_on_target_avg",
    "h2h_home_wins",
    "h2h_away_wins",
    "league_avg_goals",
    "home_strength",
    "away_strength",
];

/// ELO relative to 1500 blended with recent form
pub fn team_strength(team: &TeamProfile) -> f64 {
    let elo_normalized = (team.elo - 1500.0) / 500.0;
    elo_normalized * 0.7 + form_score(&team.form) * 0.3
}

#[derive(Debug, Clone)]
pub struct WinnerPredictor {
    classifier: Classifier,
}

impl Default for WinnerPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl WinnerPredictor {
    pub fn new() -> Self {
        Self {
            classifier: Classifier::new(PredictorId::Winner, WINNER_CLASSES, WINNER_FEATURES.len()),
        }
    }
}

impl Predictor for WinnerPredictor {
    fn id(&self) -> PredictorId {
        PredictorId::Winner
    }

    fn feature_names(&self) -> &'static [&'static str] {
        WINNER_FEATURES
    }

    fn prepare(&self, snapshot: &MatchSnapshot) -> Result<FeatureVector, PredictorError> {
        let odds = &snapshot.odds;
        let (home, away) = (&snapshot.home, &snapshot.away);
        let values = vec![
            odds.home,
            odds.draw,
            odds.away,
            form_score(&home.form),
            form_score(&away.form),
            home.goals_scored_avg,
            away.goals_scored_avg,
            home.goals_conceded_avg,
            away.goals_conceded_avg,
            home.elo,
            away.elo,
            home.possession_avg,
            away.possession_avg,
            home.shots_on_target_avg,
            away.shots_on_target_avg,
            snapshot.head_to_head.home_wins,
            snapshot.head_to_head.away_wins,
            snapshot.league_stats.avg_goals_per_game,
            team_strength(home),
            team_strength(away),
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
    use crate::domain::FormResult;
    use chrono::Utc;

    fn snapshot(home_odds: f64, away_odds: f64, home_elo: f64, away_elo: f64) -> MatchSnapshot {
        let mut s = MatchSnapshot::new("m1", "Benfica", "Sporting", Utc::now());
        s.odds.home = home_odds;
        s.odds.away = away_odds;
        s.home.elo = home_elo;
        s.away.elo = away_elo;
        s
    }

    fn training_set(p: &WinnerPredictor) -> (Vec<FeatureVector>, Vec<String>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let gap = 100.0 + i as f64 * 10.0;
            features.push(p.prepare(&snapshot(1.5, 5.0, 1500.0 + gap, 1500.0 - gap)).unwrap());
            labels.push("1".to_string());
            features.push(p.prepare(&snapshot(5.0, 1.5, 1500.0 - gap, 1500.0 + gap)).unwrap());
            labels.push("2".to_string());
            features.push(p.prepare(&snapshot(2.8, 2.8, 1500.0, 1500.0 + i as f64)).unwrap());
            labels.push("X".to_string());
        }
        (features, labels)
    }

    #[test]
    fn prepare_is_idempotent_and_sized() {
        let p = WinnerPredictor::new();
        let mut s = snapshot(2.1, 3.4, 1650.0, 1480.0);
        s.home.form = vec![FormResult::Win, FormResult::Draw];
        let a = p.prepare(&s).unwrap();
        let b = p.prepare(&s).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), WINNER_FEATURES.len());
        assert_eq!(a.values()[0], 2.1);
        assert!((a.values()[18] - (0.3 * 0.7 + 0.75 * 0.3)).abs() < 1e-12);
    }

    #[test]
    fn nan_odds_are_invalid() {
        let p = WinnerPredictor::new();
        let s = snapshot(f64::NAN, 3.0, 1500.0, 1500.0);
        assert!(matches!(
            p.prepare(&s),
            Err(PredictorError::InvalidFeature { .. })
        ));
    }

    #[test]
    fn predict_requires_training() {
        let p = WinnerPredictor::new();
        let features = p.prepare(&snapshot(2.0, 3.0, 1500.0, 1500.0)).unwrap();
        assert_eq!(
            p.predict(&features).unwrap_err(),
            PredictorError::NotTrained("winner".into())
        );
    }

    #[test]
    fn train_then_predict_favourite() {
        let mut p = WinnerPredictor::new();
        let (features, labels) = training_set(&p);
        let metrics = p.train(&features, &labels).unwrap();
        assert!(p.is_trained());
        assert_eq!(metrics.samples, 60);
        assert!(metrics.accuracy.unwrap() > 0.6);

        let strong_home = p.prepare(&snapshot(1.4, 6.0, 1800.0, 1300.0)).unwrap();
        let prediction = p.predict(&strong_home).unwrap();
        assert_eq!(prediction.label, "1");
        assert!(prediction.confidence > 0.0 && prediction.confidence <= 1.0);

        let importance = p.feature_importance();
        assert_eq!(importance.len(), WINNER_FEATURES.len());
        assert!(importance[0].importance >= importance[19].importance);
        let explanation = p.explain(&prediction);
        assert_eq!(explanation.features.len(), 5);
        assert!(explanation.text.contains("winner predicts 1"));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let mut p = WinnerPredictor::new();
        assert_eq!(
            p.train(&[], &[]).unwrap_err(),
            PredictorError::EmptyDataset("winner".into())
        );
        assert!(!p.is_trained());
    }

    #[test]
    fn unknown_label_is_rejected() {
        let mut p = WinnerPredictor::new();
        let f = p.prepare(&snapshot(2.0, 3.0, 1500.0, 1500.0)).unwrap();
        let err = p.train(&[f], &["home".to_string()]).unwrap_err();
        assert!(matches!(err, PredictorError::InvalidLabel { .. }));
    }
}
