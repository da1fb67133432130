//! Match-state snapshot consumed by the predictors.
//!
//! Snapshots are produced by ingestion and are read-only downstream. Every
//! optional statistic carries a neutral default so that a sparse provider
//! payload still yields a complete feature vector.

use super::market::{CompetitionInfo, MarketMetadata, OddsBook};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a past match from the team's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "L")]
    Loss,
}

impl FormResult {
    pub fn points(&self) -> f64 {
        match self {
            FormResult::Win => 1.0,
            FormResult::Draw => 0.5,
            FormResult::Loss => 0.0,
        }
    }
}

/// Rolling pre-match profile of one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamProfile {
    pub elo: f64,
    /// Oldest first
    pub form: Vec<FormResult>,
    /// Goals scored in recent matches, oldest first
    pub form_goals: Vec<u32>,
    pub goals_scored_avg: f64,
    pub goals_conceded_avg: f64,
    pub possession_avg: f64,
    pub shots_on_target_avg: f64,
    pub corners_avg: f64,
    pub fouls_avg: f64,
    pub table_position: u32,
    pub days_since_last_match: f64,
}

impl Default for TeamProfile {
    fn default() -> Self {
        Self {
            elo: 1500.0,
            form: Vec::new(),
            form_goals: Vec::new(),
            goals_scored_avg: 1.5,
            goals_conceded_avg: 1.2,
            possession_avg: 50.0,
            shots_on_target_avg: 5.0,
            corners_avg: 5.0,
            fouls_avg: 12.0,
            table_position: 10,
            days_since_last_match: 7.0,
        }
    }
}

/// In-play counters for one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSide {
    pub attacks: f64,
    pub dangerous_attacks: f64,
    pub shots_total: f64,
    pub shots_on_target: f64,
    pub corners: f64,
    pub fouls: f64,
    pub yellow_cards: f64,
    pub red_cards: f64,
    pub possession: f64,
}

impl Default for LiveSide {
    fn default() -> Self {
        Self {
            attacks: 0.0,
            dangerous_attacks: 0.0,
            shots_total: 0.0,
            shots_on_target: 0.0,
            corners: 0.0,
            fouls: 0.0,
            yellow_cards: 0.0,
            red_cards: 0.0,
            possession: 50.0,
        }
    }
}

impl LiveSide {
    /// Attacking momentum in [0, 1]
    pub fn momentum(&self) -> f64 {
        let raw = self.dangerous_attacks * 0.4
            + self.shots_on_target * 0.3
            + self.attacks * 0.2
            + self.shots_total * 0.1;
        (raw / 20.0).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LiveStats {
    pub home: LiveSide,
    pub away: LiveSide,
    /// Minutes since the last goal (or kick-off)
    pub minutes_since_last_goal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeagueType {
    Defensive,
    #[default]
    Normal,
    Offensive,
    VeryOffensive,
}

impl LeagueType {
    pub fn encode(&self) -> f64 {
        match self {
            LeagueType::Defensive => 0.2,
            LeagueType::Normal => 0.5,
            LeagueType::Offensive => 0.8,
            LeagueType::VeryOffensive => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueStats {
    pub avg_goals_per_game: f64,
    pub league_type: LeagueType,
}

impl Default for LeagueStats {
    fn default() -> Self {
        Self {
            avg_goals_per_game: 2.5,
            league_type: LeagueType::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HeadToHead {
    pub home_wins: f64,
    pub away_wins: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weather {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            humidity: 60.0,
            wind_speed: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stadium {
    pub capacity: f64,
    pub attendance_ratio: f64,
}

impl Default for Stadium {
    fn default() -> Self {
        Self {
            capacity: 30000.0,
            attendance_ratio: 0.8,
        }
    }
}

/// Immutable per-analysis input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub league: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    #[serde(default = "default_true")]
    pub include_for_analysis: bool,
    #[serde(default)]
    pub odds: OddsBook,
    #[serde(default)]
    pub home: TeamProfile,
    #[serde(default)]
    pub away: TeamProfile,
    #[serde(default)]
    pub live: LiveStats,
    #[serde(default)]
    pub head_to_head: HeadToHead,
    #[serde(default)]
    pub league_stats: LeagueStats,
    #[serde(default)]
    pub weather: Weather,
    #[serde(default)]
    pub stadium: Stadium,
    #[serde(default)]
    pub market: MarketMetadata,
    #[serde(default)]
    pub competition: CompetitionInfo,
}

fn default_true() -> bool {
    true
}

impl MatchSnapshot {
    /// Minimal snapshot with neutral statistics
    pub fn new(id: &str, home_team: &str, away_team: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            league: String::new(),
            start_time,
            status: MatchStatus::Scheduled,
            minute: 0,
            home_score: 0,
            away_score: 0,
            include_for_analysis: true,
            odds: OddsBook::default(),
            home: TeamProfile::default(),
            away: TeamProfile::default(),
            live: LiveStats::default(),
            head_to_head: HeadToHead::default(),
            league_stats: LeagueStats::default(),
            weather: Weather::default(),
            stadium: Stadium::default(),
            market: MarketMetadata::default(),
            competition: CompetitionInfo::default(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == MatchStatus::Live
    }

    pub fn total_goals(&self) -> u32 {
        self.home_score + self.away_score
    }

    pub fn fixture(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_payload_fills_defaults() {
        let json = r#"{
            "id": "m1",
            "home_team": "Porto",
            "away_team": "Braga",
            "start_time": "2026-03-01T18:00:00Z",
            "status": "live",
            "home": {"form": ["W", "D", "L"]}
        }"#;
        let snapshot: MatchSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.is_live());
        assert!(snapshot.include_for_analysis);
        assert_eq!(snapshot.home.elo, 1500.0);
        assert_eq!(snapshot.home.form.len(), 3);
        assert_eq!(snapshot.odds.draw, 3.0);
        assert_eq!(snapshot.away.possession_avg, 50.0);
    }

    #[test]
    fn momentum_is_capped() {
        let side = LiveSide {
            attacks: 100.0,
            dangerous_attacks: 100.0,
            ..Default::default()
        };
        assert_eq!(side.momentum(), 1.0);
        assert_eq!(LiveSide::default().momentum(), 0.0);
    }
}
