//! Scheduled analysis: run the pipeline over the current window, then push
//! unsent signals to the notification channel.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::metrics::RuntimeMetrics;
use crate::adapters::NotificationChannel;
use crate::config::PipelineConfig;
use crate::domain::PredictorId;
use crate::error::Result;
use crate::persistence::MatchStore;
use crate::strategy::SignalPipeline;
use crate::supervisor::{AlertEngine, AlertSeverity, AlertType, WorkerJob};

/// Failed matches per cycle tolerated before an ML alert
const MAX_FAILED_MATCHES: usize = 5;

/// Sends tried per signal before it is left unsent for good
pub const MAX_SEND_ATTEMPTS: u32 = 3;

pub struct AnalysisJob {
    pipeline: Arc<SignalPipeline>,
    store: Arc<dyn MatchStore>,
    window: PipelineConfig,
    channel: Option<Arc<dyn NotificationChannel>>,
    alerts: Option<Arc<AlertEngine>>,
    metrics: Arc<RuntimeMetrics>,
    send_attempts: DashMap<String, u32>,
}

impl AnalysisJob {
    pub const NAME: &'static str = "analysis";

    pub fn new(
        pipeline: Arc<SignalPipeline>,
        store: Arc<dyn MatchStore>,
        window: PipelineConfig,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        Self {
            pipeline,
            store,
            window,
            channel: None,
            alerts: None,
            metrics,
            send_attempts: DashMap::new(),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_alerts(mut self, alerts: Arc<AlertEngine>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Send every unsent signal. A failed one is tried again on later
    /// cycles, up to `MAX_SEND_ATTEMPTS` sends in total.
    pub async fn dispatch_unsent(&self) -> Result<usize> {
        let Some(channel) = &self.channel else {
            return Ok(0);
        };

        let mut sent = 0;
        for signal in self.store.unsent_signals().await? {
            let attempts = self.send_attempts.get(&signal.id).map_or(0, |a| *a);
            if attempts >= MAX_SEND_ATTEMPTS {
                continue;
            }

            match channel.send(&signal.message).await {
                Ok(receipt) => {
                    self.metrics.record_send(true);
                    self.send_attempts.remove(&signal.id);
                    self.store
                        .mark_signal_sent(&signal.id, receipt.message_id)
                        .await?;
                    sent += 1;
                }
                Err(e) => {
                    self.metrics.record_send(false);
                    let attempts = attempts + 1;
                    self.send_attempts.insert(signal.id.clone(), attempts);
                    if attempts >= MAX_SEND_ATTEMPTS {
                        error!(
                            signal_id = %signal.id,
                            attempts,
                            error = %e,
                            "Signal dispatch abandoned"
                        );
                    } else {
                        warn!(signal_id = %signal.id, attempts, error = %e, "Signal dispatch failed");
                    }
                }
            }
        }
        Ok(sent)
    }

    /// Pool the settled track records of every predictor and of multiples
    async fn refresh_accuracy(&self) -> Result<()> {
        let mut hits = 0.0;
        let mut samples = 0u64;
        let sources = std::iter::once(None).chain(PredictorId::ALL.iter().copied().map(Some));
        for predictor in sources {
            if let Some(record) = self.store.track_record(predictor).await? {
                hits += record.accuracy * record.sample_size as f64;
                samples += record.sample_size as u64;
            }
        }
        if samples > 0 {
            self.metrics
                .set_model_accuracy(hits / samples as f64, samples);
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerJob for AnalysisJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn do_work(&self) -> Result<serde_json::Value> {
        let now = Utc::now();
        let from = now - Duration::hours(self.window.lookback_hours);
        let to = now + Duration::hours(self.window.lookahead_hours);
        let candidates = self.store.analysis_candidates(from, to).await?;

        let mut emitted = 0;
        let mut failed = Vec::new();
        for snapshot in &candidates {
            match self.pipeline.run_cycle(&snapshot.id).await {
                Ok(Some(_)) => {
                    emitted += 1;
                    self.metrics.inc_signals();
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(match_id = %snapshot.id, error = %e, "Match analysis failed");
                    failed.push(snapshot.id.clone());
                }
            }
        }

        if failed.len() > MAX_FAILED_MATCHES {
            if let Some(alerts) = &self.alerts {
                alerts
                    .create(
                        AlertType::Ml,
                        AlertSeverity::Medium,
                        "Analysis failures",
                        &format!(
                            "{} of {} matches failed analysis this cycle",
                            failed.len(),
                            candidates.len()
                        ),
                    )
                    .await;
            }
        }

        let dispatched = self.dispatch_unsent().await?;
        self.refresh_accuracy().await?;

        if candidates.is_empty() {
            debug!("No matches in the analysis window");
        } else {
            info!(
                candidates = candidates.len(),
                emitted,
                failed = failed.len(),
                dispatched,
                "Analysis cycle finished"
            );
        }

        Ok(serde_json::json!({
            "candidates": candidates.len(),
            "emitted": emitted,
            "failed": failed,
            "dispatched": dispatched,
        }))
    }
}
