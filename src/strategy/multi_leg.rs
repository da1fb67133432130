//! Multi-leg strategy generator.
//!
//! Per risk tier, every k-subset (k = 2..=max_legs) of the candidate legs is
//! checked for same-market conflicts and the tier's confidence/risk bounds,
//! then scored by Monte-Carlo simulation. Legs are simulated as independent
//! Bernoulli trials; correlation between markets of the same match is not
//! modelled.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{RiskTier, StrategyConfig};
use crate::domain::{OddsBook, PredictionResult, Selection, StrategyCombination};

/// Leg candidates from predictions above the confidence floor that the book prices
pub fn candidate_selections(
    predictions: &[PredictionResult],
    odds: &OddsBook,
    min_confidence: f64,
) -> Vec<Selection> {
    predictions
        .iter()
        .filter(|p| p.confidence > min_confidence)
        .filter_map(|p| {
            let market = p.market();
            let price = odds.price_for(market, &p.label)?;
            (price > 1.0).then(|| Selection {
                market_type: market,
                outcome: p.label.clone(),
                odds: price,
                probability: p.probability,
                confidence: p.confidence,
            })
        })
        .collect()
}

pub fn has_conflict(legs: &[Selection]) -> bool {
    legs.iter()
        .enumerate()
        .any(|(i, a)| legs[i + 1..].iter().any(|b| a.conflicts_with(b)))
}

pub fn combined_odds(legs: &[Selection]) -> f64 {
    legs.iter().map(|l| l.odds).product()
}

pub fn mean_confidence(legs: &[Selection]) -> f64 {
    if legs.is_empty() {
        return 0.0;
    }
    legs.iter().map(|l| l.confidence).sum::<f64>() / legs.len() as f64
}

/// Grows with leg count and with average odds above evens, in [0, 1]
pub fn combination_risk(legs: &[Selection]) -> f64 {
    if legs.is_empty() {
        return 0.0;
    }
    let avg_odds = legs.iter().map(|l| l.odds).sum::<f64>() / legs.len() as f64;
    ((legs.len() as f64 - 1.0) * 0.1 + (avg_odds - 2.0) * 0.05).clamp(0.0, 1.0)
}

/// Fraction of `trials` in which every leg wins
pub fn simulate<R: Rng>(legs: &[Selection], trials: usize, rng: &mut R) -> f64 {
    if trials == 0 {
        return 0.0;
    }
    let wins = (0..trials)
        .filter(|_| {
            legs.iter()
                .all(|leg| rng.gen_bool(leg.probability.clamp(0.0, 1.0)))
        })
        .count();
    wins as f64 / trials as f64
}

/// Index subsets of size `k` out of `n`, lexicographic
pub fn k_subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
    fn walk(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            walk(i + 1, n, k, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    if k == 0 || k > n {
        return out;
    }
    walk(0, n, k, &mut Vec::with_capacity(k), &mut out);
    out
}

#[derive(Debug, Clone)]
pub struct MultiLegGenerator {
    config: StrategyConfig,
}

impl MultiLegGenerator {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Best combination over all tiers, seeded from config (or entropy)
    pub fn generate(&self, legs: &[Selection]) -> Option<StrategyCombination> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.generate_with_rng(legs, &mut rng)
    }

    /// `None` when no subset survives the conflict and tier filters.
    /// Otherwise the highest-EV combination, marked ineligible when its EV
    /// does not clear `min_expected_value`.
    pub fn generate_with_rng<R: Rng>(
        &self,
        legs: &[Selection],
        rng: &mut R,
    ) -> Option<StrategyCombination> {
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut evaluated: Vec<StrategyCombination> = Vec::new();

        for tier in &self.config.tiers {
            let max_legs = tier.max_legs.clamp(2, 4).min(legs.len());
            for k in 2..=max_legs {
                for subset in k_subsets(legs.len(), k) {
                    if seen.contains(&subset) {
                        continue;
                    }
                    let chosen: Vec<Selection> = subset.iter().map(|&i| legs[i].clone()).collect();
                    if !admits(tier, &chosen) {
                        continue;
                    }
                    seen.insert(subset);
                    evaluated.push(self.score(tier, chosen, rng));
                }
            }
        }

        debug!(
            candidates = legs.len(),
            evaluated = evaluated.len(),
            "Multi-leg search finished"
        );

        let mut best = evaluated
            .into_iter()
            .max_by(|a, b| a.expected_value.total_cmp(&b.expected_value))?;
        best.eligible = best.expected_value > self.config.min_expected_value;
        Some(best)
    }

    fn score<R: Rng>(
        &self,
        tier: &RiskTier,
        selections: Vec<Selection>,
        rng: &mut R,
    ) -> StrategyCombination {
        let win_rate = simulate(&selections, self.config.simulations, rng);
        let odds = combined_odds(&selections);
        StrategyCombination {
            tier: tier.name.clone(),
            combined_odds: odds,
            win_rate,
            expected_value: win_rate * odds - 1.0,
            risk_score: combination_risk(&selections),
            mean_confidence: mean_confidence(&selections),
            selections,
            eligible: false,
        }
    }
}

fn admits(tier: &RiskTier, legs: &[Selection]) -> bool {
    !has_conflict(legs)
        && mean_confidence(legs) >= tier.min_mean_confidence
        && combination_risk(legs) <= tier.max_risk_score + 1e-9
}
