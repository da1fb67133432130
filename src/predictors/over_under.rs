//! Dynamic over/under predictor.
//!
//! A Poisson regression estimates the expected total goals. The goal line
//! is not fixed at 2.5: it shifts with league style, rest days and weather,
//! and the side probability comes from the Poisson CDF at that line.

use super::{check_input, check_loaded, check_training_set, last_n};
use super::{FeatureVector, Prediction, Predictor};
use crate::domain::{FormResult, MatchSnapshot, PredictorId, TeamProfile};
use crate::error::PredictorError;
use crate::ml::{train_poisson, DenseNetwork, TrainOptions, TrainingMetrics};

pub const OVER_UNDER_FEATURES: &[&str] = &[
    "home_goals_scored_avg",
    "away_goals_scored_avg",
    "home_goals_conceded_avg",
    "away_goals_conceded_avg",
    "league_avg_goals_per_game",
    "home_form_goals_avg",
    "away_form_goals_avg",
    "home_shots_on_target_avg",
    "away_shots_on_target_avg",
    "home_possession_avg",
    "away_possession_avg",
    "home_corners_avg",
    "away_corners_avg",
    "home_fouls_avg",
    "away_fouls_avg",
    "weather_temperature",
    "weather_humidity",
    "weather_wind_speed",
    "stadium_capacity",
    "attendance_ratio",
    "home_attacking_strength",
    "away_attacking_strength",
    "home_defensive_strength",
    "away_defensive_strength",
    "league_type",
    "match_importance",
    "days_since_last_match_home",
    "days_since_last_match_away",
    "home_team_momentum",
    "away_team_momentum",
];

const IDX_TEMPERATURE: usize = 15;
const IDX_WIND: usize = 17;
const IDX_LEAGUE_TYPE: usize = 24;
const IDX_DAYS_HOME: usize = 26;
const IDX_DAYS_AWAY: usize = 27;

pub const BASE_LINE: f64 = 2.5;
pub const MIN_LINE: f64 = 1.5;
pub const MAX_LINE: f64 = 4.5;

/// Goal line adjusted for league style, rest and weather, in [1.5, 4.5]
pub fn dynamic_line(features: &[f64]) -> f64 {
    let at = |i: usize| features.get(i).copied().unwrap_or(0.0);
    let mut line = BASE_LINE;

    let league_type = at(IDX_LEAGUE_TYPE);
    if league_type > 0.7 {
        line += 0.3;
    } else if league_type < 0.3 {
        line -= 0.3;
    }

    let (days_home, days_away) = (at(IDX_DAYS_HOME), at(IDX_DAYS_AWAY));
    if days_home > 14.0 || days_away > 14.0 {
        line += 0.2;
    } else if days_home < 3.0 || days_away < 3.0 {
        line -= 0.2;
    }

    let temperature = at(IDX_TEMPERATURE);
    if !(5.0..=35.0).contains(&temperature) {
        line -= 0.1;
    }
    if at(IDX_WIND) > 20.0 {
        line -= 0.1;
    }

    // Keep one decimal so labels and pricing agree
    (line.clamp(MIN_LINE, MAX_LINE) * 10.0).round() / 10.0
}

/// P(X <= floor(k)) for X ~ Poisson(lambda)
pub fn poisson_cdf(k: f64, lambda: f64) -> f64 {
    if k < 0.0 {
        return 0.0;
    }
    let lambda = lambda.max(1e-9);
    let mut term = (-lambda).exp();
    let mut sum = term;
    for i in 1..=(k.floor() as u32) {
        term *= lambda / i as f64;
        sum += term;
    }
    sum.min(1.0)
}

pub fn goals_avg(goals: &[u32]) -> f64 {
    let recent = last_n(goals, 5);
    if recent.is_empty() {
        return 1.5;
    }
    recent.iter().map(|g| *g as f64).sum::<f64>() / recent.len() as f64
}

pub fn attacking_strength(team: &TeamProfile) -> f64 {
    (team.goals_scored_avg * 0.5 + team.shots_on_target_avg * 0.3 + team.possession_avg * 0.02)
        / 10.0
}

pub fn defensive_strength(team: &TeamProfile) -> f64 {
    (((2.5 - team.goals_conceded_avg) * 0.7 + (15.0 - team.fouls_avg) * 0.3) / 10.0).clamp(0.0, 1.0)
}

/// Close table positions, title races and relegation fights weigh more
pub fn match_importance(home: &TeamProfile, away: &TeamProfile) -> f64 {
    let mut importance: f64 = 0.5;
    let diff = home.table_position.abs_diff(away.table_position);
    if diff <= 2 {
        importance += 0.2;
    } else if diff <= 5 {
        importance += 0.1;
    }
    if home.table_position <= 3 || away.table_position <= 3 {
        importance += 0.1;
    }
    if home.table_position >= 18 || away.table_position >= 18 {
        importance += 0.1;
    }
    importance.min(1.0)
}

/// Recency-weighted form, most recent result weighs 0.4
pub fn team_momentum(form: &[FormResult]) -> f64 {
    const WEIGHTS: [f64; 5] = [0.4, 0.3, 0.2, 0.1, 0.0];
    if form.is_empty() {
        return 0.5;
    }
    last_n(form, 5)
        .iter()
        .rev()
        .zip(WEIGHTS)
        .map(|(result, w)| w * result.points())
        .sum()
}

#[derive(Debug, Clone, Default)]
pub struct OverUnderPredictor {
    network: Option<DenseNetwork>,
}

impl OverUnderPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    fn expected_goals(&self, features: &FeatureVector) -> Result<f64, PredictorError> {
        let network = check_input(self.id(), self.network.as_ref(), features)?;
        network
            .forward_scalar(features.values())
            .map_err(|e| PredictorError::InvalidFeature {
                predictor: self.id().to_string(),
                reason: e.to_string(),
            })
    }
}

impl Predictor for OverUnderPredictor {
    fn id(&self) -> PredictorId {
        PredictorId::OverUnder
    }

    fn feature_names(&self) -> &'static [&'static str] {
        OVER_UNDER_FEATURES
    }

    fn prepare(&self, snapshot: &MatchSnapshot) -> Result<FeatureVector, PredictorError> {
        let (home, away) = (&snapshot.home, &snapshot.away);
        let values = vec![
            home.goals_scored_avg,
            away.goals_scored_avg,
            home.goals_conceded_avg,
            away.goals_conceded_avg,
            snapshot.league_stats.avg_goals_per_game,
            goals_avg(&home.form_goals),
            goals_avg(&away.form_goals),
            home.shots_on_target_avg,
            away.shots_on_target_avg,
            home.possession_avg,
            away.possession_avg,
            home.corners_avg,
            away.corners_avg,
            home.fouls_avg,
            away.fouls_avg,
            snapshot.weather.temperature,
            snapshot.weather.humidity,
            snapshot.weather.wind_speed,
            snapshot.stadium.capacity,
            snapshot.stadium.attendance_ratio,
            attacking_strength(home),
            attacking_strength(away),
            defensive_strength(home),
            defensive_strength(away),
            snapshot.league_stats.league_type.encode(),
            match_importance(home, away),
            home.days_since_last_match,
            away.days_since_last_match,
            team_momentum(&home.form),
            team_momentum(&away.form),
        ];
        FeatureVector::new(self.id(), values)
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError> {
        let lambda = self.expected_goals(features)?;
        let line = dynamic_line(features.values());

        let p_under = poisson_cdf(line, lambda).clamp(0.05, 0.95);
        let p_over = (1.0 - poisson_cdf(line, lambda)).clamp(0.05, 0.95);
        let over = format!("over_{line:.1}");
        let under = format!("under_{line:.1}");

        let (label, probability) = if p_over >= p_under {
            (over.clone(), p_over)
        } else {
            (under.clone(), p_under)
        };

        Ok(Prediction {
            label,
            probability,
            confidence: ((probability - 0.5).abs() * 2.0).clamp(0.0, 1.0),
            class_probabilities: vec![(over, p_over), (under, p_under)],
        })
    }

    /// Labels are observed total goals, e.g. "3"
    fn train(
        &mut self,
        features: &[FeatureVector],
        labels: &[String],
    ) -> Result<TrainingMetrics, PredictorError> {
        check_training_set(self.id(), features, labels, OVER_UNDER_FEATURES.len())?;
        let targets = labels
            .iter()
            .map(|label| {
                label
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|g| g.is_finite() && *g >= 0.0)
                    .ok_or_else(|| PredictorError::InvalidLabel {
                        predictor: self.id().to_string(),
                        label: label.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows: Vec<Vec<f64>> = features.iter().map(|f| f.values().to_vec()).collect();
        let opts = TrainOptions {
            epochs: 400,
            learning_rate: 0.02,
            ..Default::default()
        };
        let (mut network, mut metrics) = train_poisson(&rows, &targets, opts);

        // Side accuracy against each row's own dynamic line
        let correct = rows
            .iter()
            .zip(&targets)
            .filter(|(row, actual)| {
                let line = dynamic_line(row);
                let predicted = network.forward_scalar(row).unwrap_or(BASE_LINE);
                (**actual > line) == (predicted > line)
            })
            .count();
        metrics.accuracy = Some(correct as f64 / rows.len() as f64);

        network.metadata = serde_json::json!({
            "predictor": self.id().as_str(),
            "metrics": metrics,
            "trained_at": chrono::Utc::now().to_rfc3339(),
        });
        self.network = Some(network);
        Ok(metrics)
    }

    fn is_trained(&self) -> bool {
        self.network.is_some()
    }

    fn parameters(&self) -> Option<&DenseNetwork> {
        self.network.as_ref()
    }

    fn load(&mut self, parameters: DenseNetwork) -> Result<(), PredictorError> {
        check_loaded(self.id(), &parameters, OVER_UNDER_FEATURES.len(), 1)?;
        self.network = Some(parameters);
        Ok(())
    }
}
