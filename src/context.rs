//! Process-wide context, built once at startup and passed by reference.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::{
    FileSnapshotProvider, HttpSnapshotProvider, LogChannel, NotificationChannel,
    SnapshotProvider, StaticSnapshotProvider, TelegramChannel, WebhookChannel,
};
use crate::config::AppConfig;
use crate::error::{BetSignalError, Result};
use crate::persistence::{InMemoryStore, LocalModelRegistry, MatchStore, ModelRegistry};
use crate::predictors::PredictorRegistry;
use crate::services::{
    AlertMonitorJob, AnalysisJob, HealthCheckJob, IngestionJob, RuntimeMetrics, StatusServer,
    StatusState,
};
use crate::strategy::{DecisionCombiner, MultiLegGenerator, SignalPipeline, ValueFilter};
use crate::supervisor::{AlertEngine, Worker, WorkerManager};

/// External boundaries the context is assembled from
pub struct Boundaries {
    pub store: Arc<dyn MatchStore>,
    pub models: Arc<dyn ModelRegistry>,
    pub provider: Arc<dyn SnapshotProvider>,
    /// Where signals are delivered
    pub signal_channel: Arc<dyn NotificationChannel>,
    /// Where alerts are delivered, in addition to the log
    pub alert_channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Boundaries {
    /// Boundaries described by the configuration
    pub fn from_config(config: &AppConfig) -> Self {
        let models_dir = std::path::PathBuf::from(&config.storage.models_dir);
        let store: Arc<dyn MatchStore> =
            Arc::new(InMemoryStore::with_parameters_dir(models_dir.join("parameters")));
        let models: Arc<dyn ModelRegistry> = Arc::new(LocalModelRegistry::new(&models_dir));

        let provider: Arc<dyn SnapshotProvider> = match (&config.provider.url, &config.provider.path) {
            (Some(url), _) => Arc::new(HttpSnapshotProvider::new(
                url.clone(),
                config.provider.api_key.clone(),
            )),
            (None, Some(path)) => Arc::new(FileSnapshotProvider::new(path)),
            (None, None) => {
                warn!("No snapshot provider configured, ingestion will fetch nothing");
                Arc::new(StaticSnapshotProvider::default())
            }
        };

        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        if let (Some(token), Some(chat_id)) = (&config.telegram.bot_token, &config.telegram.chat_id) {
            channels.push(Arc::new(TelegramChannel::new(token.clone(), chat_id.clone())));
        }
        if let Some(url) = &config.webhook.url {
            channels.push(Arc::new(WebhookChannel::new(url.clone())));
        }

        let signal_channel: Arc<dyn NotificationChannel> = match channels.first() {
            Some(channel) => channel.clone(),
            None => Arc::new(LogChannel::new()),
        };

        Self {
            store,
            models,
            provider,
            signal_channel,
            alert_channels: channels,
        }
    }
}

pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn MatchStore>,
    pub registry: Arc<PredictorRegistry>,
    pub pipeline: Arc<SignalPipeline>,
    pub alerts: Arc<AlertEngine>,
    pub workers: Arc<WorkerManager>,
    pub metrics: Arc<RuntimeMetrics>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl AppContext {
    /// Validate the config and assemble everything from it
    pub async fn init(config: AppConfig) -> Result<Arc<Self>> {
        let boundaries = Boundaries::from_config(&config);
        Self::assemble(config, boundaries).await
    }

    pub async fn assemble(config: AppConfig, boundaries: Boundaries) -> Result<Arc<Self>> {
        config
            .validate()
            .map_err(|errors| BetSignalError::Validation(errors.join("; ")))?;

        let Boundaries {
            store,
            models,
            provider,
            signal_channel,
            alert_channels,
        } = boundaries;

        let metrics = Arc::new(RuntimeMetrics::new());

        let registry = Arc::new(PredictorRegistry::new(store.clone(), models));
        let loaded = registry.load_persisted().await?;
        info!(loaded, "Predictors initialised");

        let combiner = DecisionCombiner::new(
            registry.clone(),
            store.clone(),
            MultiLegGenerator::new(config.strategy.clone()),
            ValueFilter::new(config.value_filter.clone()),
            config.pipeline.clone(),
        );
        let pipeline = Arc::new(SignalPipeline::new(store.clone(), combiner));

        let alerts = {
            let mut engine =
                AlertEngine::from_config(&config.alerts).with_metrics(metrics.clone());
            for channel in alert_channels {
                engine = engine.with_channel(channel);
            }
            Arc::new(engine)
        };

        let workers = Arc::new(
            WorkerManager::new(Duration::from_millis(config.workers.restart_delay_ms))
                .with_alerts(alerts.clone())
                .with_metrics(metrics.clone()),
        );

        let supervised = |worker: Worker| {
            worker
                .with_alerts(alerts.clone())
                .with_metrics(metrics.clone())
                .escalate_after(config.workers.escalate_after_failures)
        };

        let wc = &config.workers;
        workers
            .register(supervised(Worker::new(
                Arc::new(IngestionJob::new(provider, store.clone(), metrics.clone())),
                wc.ingestion_interval_secs,
            )))
            .await;
        workers
            .register(supervised(Worker::new(
                Arc::new(
                    AnalysisJob::new(
                        pipeline.clone(),
                        store.clone(),
                        config.pipeline.clone(),
                        metrics.clone(),
                    )
                    .with_channel(signal_channel)
                    .with_alerts(alerts.clone()),
                ),
                wc.analysis_interval_secs,
            )))
            .await;
        workers
            .register(supervised(Worker::new(
                Arc::new(AlertMonitorJob::new(alerts.clone(), metrics.clone())),
                wc.alert_interval_secs,
            )))
            .await;
        workers
            .register(supervised(Worker::new(
                Arc::new(HealthCheckJob::new(&workers, metrics.clone())),
                wc.health_check_interval_secs,
            )))
            .await;

        info!(
            workers = ?workers.names().await,
            alert_channels = ?alerts.channel_names(),
            "Context assembled"
        );

        Ok(Arc::new(Self {
            config,
            store,
            registry,
            pipeline,
            alerts,
            workers,
            metrics,
            server: Mutex::new(None),
        }))
    }

    /// Start every worker, and the status server when a port is configured
    pub async fn start(&self) {
        self.workers.start_all().await;

        if let Some(port) = self.config.server.port {
            let state = Arc::new(StatusState::new(
                self.workers.clone(),
                self.alerts.clone(),
                self.metrics.clone(),
            ));
            let server = StatusServer::new(state, port);
            let handle = tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    error!("Status server error: {}", e);
                }
            });
            *self.server.lock().await = Some(handle);
        }
        info!("Service started");
    }

    pub async fn shutdown(&self) {
        info!("Shutting down...");
        self.workers.stop_all().await;
        if let Some(handle) = self.server.lock().await.take() {
            handle.abort();
        }
        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockNotificationChannel;

    fn boundaries() -> Boundaries {
        let mut channel = MockNotificationChannel::new();
        channel.expect_name().return_const("mock".to_string());
        Boundaries {
            store: Arc::new(InMemoryStore::new()),
            models: Arc::new(LocalModelRegistry::in_memory()),
            provider: Arc::new(StaticSnapshotProvider::default()),
            signal_channel: Arc::new(channel),
            alert_channels: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_assemble_registers_all_workers() {
        let ctx = AppContext::assemble(AppConfig::default(), boundaries())
            .await
            .unwrap();
        assert_eq!(
            ctx.workers.names().await,
            vec!["alert_monitor", "analysis", "health_check", "ingestion"]
        );
        assert_eq!(ctx.alerts.rules().await.len(), 5);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.workers.analysis_interval_secs = 0;
        let err = AppContext::assemble(config, boundaries()).await.err().unwrap();
        assert!(matches!(err, BetSignalError::Validation(_)));
    }
}
