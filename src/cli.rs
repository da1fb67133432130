use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tabled::{Table, Tabled};

use crate::context::AppContext;
use crate::domain::{CompetitionInfo, MarketMetadata, MatchSnapshot, PredictorId};
use crate::error::{BetSignalError, Result};
use crate::persistence::TrackRecord;
use crate::strategy::{Candidate, Decision, ValueFilter, ValueInput};

#[derive(Parser)]
#[command(name = "betsignal")]
#[command(version = "0.1.0")]
#[command(about = "Sports betting signal service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (default.toml plus BETSIGNAL_ENV overlay)
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the workers until interrupted
    Run,
    /// Evaluate one match snapshot without persisting a signal
    Analyze {
        /// JSON file holding one match snapshot
        #[arg(short, long)]
        snapshot: String,
        /// Print the full decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// Train a predictor from a labelled dataset
    Train {
        /// winner, next_goal or over_under
        #[arg(short, long)]
        predictor: PredictorId,
        /// JSON array of {snapshot | features, label}
        #[arg(short, long)]
        dataset: String,
    },
    /// Show predictor status
    Predictors,
    /// Assess a single price with the value filter
    Value {
        /// Model probability of the outcome
        #[arg(short, long)]
        probability: f64,
        /// Decimal odds offered
        #[arg(short, long)]
        odds: f64,
        #[arg(long, default_value = "0.65")]
        confidence: f64,
        /// Historical hit rate of the predictor
        #[arg(long, default_value = "0.65")]
        accuracy: f64,
        #[arg(long, default_value = "100")]
        sample_size: u32,
    },
}

/// One labelled training example
#[derive(Debug, Deserialize)]
pub struct TrainingRow {
    #[serde(default)]
    pub snapshot: Option<MatchSnapshot>,
    #[serde(default)]
    pub features: Option<Vec<f64>>,
    pub label: String,
}

#[derive(Tabled, Serialize)]
struct PredictionRow {
    #[tabled(rename = "Predictor")]
    predictor: String,
    #[tabled(rename = "Pick")]
    label: String,
    #[tabled(rename = "Prob")]
    probability: String,
    #[tabled(rename = "Conf")]
    confidence: String,
}

#[derive(Tabled, Serialize)]
struct CandidateRow {
    #[tabled(rename = "Candidate")]
    label: String,
    #[tabled(rename = "Odds")]
    odds: String,
    #[tabled(rename = "EV")]
    expected_value: String,
    #[tabled(rename = "Kelly")]
    kelly: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
}

impl CandidateRow {
    fn from_candidate(candidate: &Candidate) -> Self {
        let a = &candidate.assessment;
        Self {
            label: candidate.label(),
            odds: format!("{:.2}", candidate.odds),
            expected_value: format!("{:+.3}", a.expected_value),
            kelly: format!("{:.3}", a.kelly_fraction),
            risk: format!("{:.2}", a.risk_score),
            verdict: verdict(a.is_value_bet, &a.reject_reasons),
        }
    }
}

#[derive(Tabled, Serialize)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn verdict(accepted: bool, reasons: &[crate::domain::RejectReason]) -> String {
    if accepted {
        "accepted".to_string()
    } else {
        reasons
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn print_decision(decision: &Decision) {
    let predictions: Vec<PredictionRow> = decision
        .predictions
        .iter()
        .map(|p| PredictionRow {
            predictor: p.predictor_id.to_string(),
            label: p.label.clone(),
            probability: format!("{:.1}%", p.probability * 100.0),
            confidence: format!("{:.1}%", p.confidence * 100.0),
        })
        .collect();

    if predictions.is_empty() {
        println!("(no predictions)");
    } else {
        println!("{}", Table::new(&predictions));
    }
    for skipped in &decision.skipped {
        println!("skipped {}: {}", skipped.predictor_id, skipped.reason);
    }

    let candidates: Vec<CandidateRow> = decision
        .single
        .iter()
        .chain(decision.combination.iter())
        .map(CandidateRow::from_candidate)
        .collect();
    if !candidates.is_empty() {
        println!("{}", Table::new(&candidates));
    }
}

pub async fn analyze_snapshot(ctx: &AppContext, path: &str, json: bool) -> Result<()> {
    let snapshot: MatchSnapshot = read_json(Path::new(path))?;
    let evaluation = ctx.pipeline.evaluate(&snapshot).await?;

    if json {
        let out = serde_json::json!({
            "decision": evaluation.decision,
            "signal": evaluation.signal,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{} vs {} ({})",
        snapshot.home_team, snapshot.away_team, snapshot.id
    );
    print_decision(&evaluation.decision);
    match evaluation.signal {
        Some(signal) => println!("\n{}", signal.message),
        None => println!("\nNo value found"),
    }
    Ok(())
}

pub async fn train_predictor(ctx: &AppContext, predictor: PredictorId, path: &str) -> Result<()> {
    let rows: Vec<TrainingRow> = read_json(Path::new(path))?;

    let mut features = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let values = match (row.features, row.snapshot) {
            (Some(values), _) => values,
            (None, Some(snapshot)) => ctx.registry.prepare(predictor, &snapshot).await?,
            (None, None) => {
                return Err(BetSignalError::Validation(format!(
                    "dataset row {i} has neither features nor snapshot"
                )))
            }
        };
        features.push(values);
        labels.push(row.label);
    }

    let (metrics, model_ref) = ctx.registry.train(predictor, features, labels).await?;

    let mut table = vec![
        MetricRow {
            metric: "samples",
            value: metrics.samples.to_string(),
        },
        MetricRow {
            metric: "epochs",
            value: metrics.epochs.to_string(),
        },
        MetricRow {
            metric: "version",
            value: model_ref.version.to_string(),
        },
        MetricRow {
            metric: "model",
            value: model_ref.uri,
        },
    ];
    if let Some(accuracy) = metrics.accuracy {
        table.push(MetricRow {
            metric: "accuracy",
            value: format!("{:.1}%", accuracy * 100.0),
        });
    }
    println!("{}", Table::new(&table));
    Ok(())
}

pub async fn show_predictors(ctx: &AppContext) -> Result<()> {
    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "Predictor")]
        id: String,
        #[tabled(rename = "Trained")]
        trained: bool,
        #[tabled(rename = "Features")]
        features: usize,
    }

    let rows: Vec<StatusRow> = ctx
        .registry
        .status()
        .await
        .into_iter()
        .map(|s| StatusRow {
            id: s.id.to_string(),
            trained: s.trained,
            features: s.features,
        })
        .collect();
    println!("{}", Table::new(&rows));
    Ok(())
}

pub fn assess_value(
    filter: &ValueFilter,
    probability: f64,
    odds: f64,
    confidence: f64,
    accuracy: f64,
    sample_size: u32,
) -> Result<()> {
    if odds <= 1.0 {
        return Err(BetSignalError::Validation(format!(
            "odds must be greater than 1.0, got {odds}"
        )));
    }

    let assessment = filter.assess(&ValueInput {
        probability,
        odds,
        confidence,
        track_record: TrackRecord {
            accuracy,
            sample_size,
        },
        market: MarketMetadata::default(),
        competition: CompetitionInfo::default(),
    });

    let rows = vec![
        MetricRow {
            metric: "implied probability",
            value: format!("{:.1}%", assessment.implied_probability * 100.0),
        },
        MetricRow {
            metric: "expected value",
            value: format!("{:+.3}", assessment.expected_value),
        },
        MetricRow {
            metric: "kelly stake",
            value: format!("{:.1}%", assessment.kelly_fraction * 100.0),
        },
        MetricRow {
            metric: "value score",
            value: format!("{:.3}", assessment.value_score),
        },
        MetricRow {
            metric: "blended confidence",
            value: format!("{:.1}%", assessment.blended_confidence * 100.0),
        },
        MetricRow {
            metric: "tier",
            value: assessment.tier.as_str().to_string(),
        },
        MetricRow {
            metric: "verdict",
            value: verdict(assessment.is_value_bet, &assessment.reject_reasons),
        },
    ];
    println!("{}", Table::new(&rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValueFilterConfig;

    #[test]
    fn parses_train_command() {
        let cli = Cli::parse_from([
            "betsignal",
            "train",
            "--predictor",
            "over_under",
            "--dataset",
            "rows.json",
        ]);
        match cli.command {
            Some(Commands::Train { predictor, dataset }) => {
                assert_eq!(predictor, PredictorId::OverUnder);
                assert_eq!(dataset, "rows.json");
            }
            _ => panic!("expected train"),
        }
        assert_eq!(cli.config, "config");
    }

    #[test]
    fn training_row_accepts_raw_features() {
        let rows: Vec<TrainingRow> =
            serde_json::from_str(r#"[{"features": [0.1, 0.2], "label": "1"}]"#).unwrap();
        assert_eq!(rows[0].features.as_deref(), Some(&[0.1, 0.2][..]));
        assert!(rows[0].snapshot.is_none());
    }

    #[test]
    fn missing_dataset_names_the_file() {
        let err = read_json::<Vec<TrainingRow>>(Path::new("/nonexistent/rows.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rows.json"));
    }

    #[test]
    fn value_rejects_non_paying_odds() {
        let filter = ValueFilter::new(ValueFilterConfig::default());
        let err = assess_value(&filter, 0.6, 1.0, 0.7, 0.6, 100).unwrap_err();
        assert!(matches!(err, BetSignalError::Validation(_)));
        assert!(assess_value(&filter, 0.6, 2.1, 0.7, 0.6, 100).is_ok());
    }
}
