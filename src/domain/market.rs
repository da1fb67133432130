use serde::{Deserialize, Serialize};

/// Betting market a prediction or leg belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// Full-time result, outcomes "1" / "X" / "2"
    MatchResult,
    /// Next team to score, outcomes "home" / "away" / "none"
    NextGoal,
    /// Total goals, outcomes "over_<line>" / "under_<line>"
    TotalGoals,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::MatchResult => "match_result",
            MarketType::NextGoal => "next_goal",
            MarketType::TotalGoals => "total_goals",
        }
    }
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decimal odds quoted for the markets the predictors cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsBook {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
    pub over_1_5: f64,
    pub over_2_5: f64,
    pub under_2_5: f64,
    pub next_goal_home: f64,
    pub next_goal_away: f64,
    pub next_goal_none: f64,
}

impl Default for OddsBook {
    fn default() -> Self {
        Self {
            home: 2.0,
            draw: 3.0,
            away: 2.0,
            over_1_5: 1.5,
            over_2_5: 2.0,
            under_2_5: 1.8,
            next_goal_home: 2.2,
            next_goal_away: 2.2,
            next_goal_none: 3.0,
        }
    }
}

impl OddsBook {
    /// Price for an outcome of a market, `None` when the book has no quote for it.
    ///
    /// Total goals are quoted at over 1.5 and over/under 2.5 only. Any other
    /// line is unpriced, so a pick on it never becomes a candidate.
    pub fn price_for(&self, market: MarketType, outcome: &str) -> Option<f64> {
        match market {
            MarketType::MatchResult => match outcome {
                "1" => Some(self.home),
                "X" => Some(self.draw),
                "2" => Some(self.away),
                _ => None,
            },
            MarketType::NextGoal => match outcome {
                "home" => Some(self.next_goal_home),
                "away" => Some(self.next_goal_away),
                "none" => Some(self.next_goal_none),
                _ => None,
            },
            MarketType::TotalGoals => {
                let (side, line) = parse_total_goals(outcome)?;
                let at = |quoted: f64| (line - quoted).abs() < LINE_EPSILON;
                match side {
                    TotalSide::Over if at(1.5) => Some(self.over_1_5),
                    TotalSide::Over if at(2.5) => Some(self.over_2_5),
                    TotalSide::Under if at(2.5) => Some(self.under_2_5),
                    _ => None,
                }
            }
        }
    }
}

const LINE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalSide {
    Over,
    Under,
}

/// Parse "over_2.5" / "under_1.8" into side and line
pub fn parse_total_goals(outcome: &str) -> Option<(TotalSide, f64)> {
    let (side, line) = outcome.split_once('_')?;
    let side = match side {
        "over" => TotalSide::Over,
        "under" => TotalSide::Under,
        _ => return None,
    };
    let line: f64 = line.parse().ok()?;
    line.is_finite().then_some((side, line))
}

/// Liquidity and pricing metadata of the market being assessed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMetadata {
    /// Traded volume
    pub volume: f64,
    /// Relative odds drift since open (0.25 = 25%)
    pub odds_movement: f64,
    /// Bookmaker overround
    pub bookmaker_margin: f64,
}

impl Default for MarketMetadata {
    fn default() -> Self {
        Self {
            volume: 1000.0,
            odds_movement: 0.0,
            bookmaker_margin: 0.05,
        }
    }
}

/// Competition level, used as a risk penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionTier {
    Amateur,
    SemiPro,
    #[default]
    Normal,
    Professional,
    Elite,
}

impl CompetitionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionTier::Amateur => "amateur",
            CompetitionTier::SemiPro => "semi_pro",
            CompetitionTier::Normal => "normal",
            CompetitionTier::Professional => "professional",
            CompetitionTier::Elite => "elite",
        }
    }
}

impl std::fmt::Display for CompetitionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionInfo {
    pub tier: CompetitionTier,
    /// 0..1, how efficiently the market prices this competition
    pub market_efficiency: f64,
}

impl Default for CompetitionInfo {
    fn default() -> Self {
        Self {
            tier: CompetitionTier::Normal,
            market_efficiency: 0.7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_match_result_outcomes() {
        let odds = OddsBook {
            home: 2.1,
            draw: 3.3,
            away: 3.6,
            ..Default::default()
        };
        assert_eq!(odds.price_for(MarketType::MatchResult, "1"), Some(2.1));
        assert_eq!(odds.price_for(MarketType::MatchResult, "X"), Some(3.3));
        assert_eq!(odds.price_for(MarketType::MatchResult, "2"), Some(3.6));
        assert_eq!(odds.price_for(MarketType::MatchResult, "home"), None);
    }

    #[test]
    fn prices_total_goals_by_line() {
        let odds = OddsBook::default();
        assert_eq!(odds.price_for(MarketType::TotalGoals, "over_1.5"), Some(1.5));
        assert_eq!(odds.price_for(MarketType::TotalGoals, "over_2.5"), Some(2.0));
        assert_eq!(odds.price_for(MarketType::TotalGoals, "under_2.5"), Some(1.8));
        assert_eq!(odds.price_for(MarketType::TotalGoals, "sideways_2.5"), None);
    }

    #[test]
    fn unquoted_total_goals_lines_have_no_price() {
        let odds = OddsBook {
            over_2_5: 1.9,
            under_2_5: 2.0,
            ..Default::default()
        };
        for outcome in ["under_3.0", "under_4.0", "over_4.5", "over_2.8", "under_1.5"] {
            assert_eq!(odds.price_for(MarketType::TotalGoals, outcome), None, "{outcome}");
        }
    }

    #[test]
    fn parses_total_goals_outcome() {
        assert_eq!(
            parse_total_goals("under_3.5"),
            Some((TotalSide::Under, 3.5))
        );
        assert_eq!(parse_total_goals("over"), None);
    }
}
