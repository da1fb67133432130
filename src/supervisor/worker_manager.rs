//! Named workers and their aggregate health.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::alerts::{Alert, AlertEngine, AlertSeverity, AlertType};
use super::worker::{Worker, WorkerState};
use crate::error::{BetSignalError, Result};
use crate::services::RuntimeMetrics;

/// Result of one aggregate health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub unhealthy: Vec<String>,
    pub workers: Vec<WorkerState>,
}

pub struct WorkerManager {
    workers: RwLock<BTreeMap<String, Arc<Worker>>>,
    restart_delay: Duration,
    alerts: Option<Arc<AlertEngine>>,
    metrics: Option<Arc<RuntimeMetrics>>,
}

impl WorkerManager {
    pub fn new(restart_delay: Duration) -> Self {
        Self {
            workers: RwLock::new(BTreeMap::new()),
            restart_delay,
            alerts: None,
            metrics: None,
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<AlertEngine>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RuntimeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register (or replace) a worker under its job name
    pub async fn register(&self, worker: Worker) -> Arc<Worker> {
        let worker = Arc::new(worker);
        let name = worker.name().to_string();
        let previous = self.workers.write().await.insert(name.clone(), worker.clone());
        if let Some(previous) = previous {
            previous.stop().await;
        }
        debug!(worker = %name, "Registered worker");
        worker
    }

    pub async fn get(&self, name: &str) -> Result<Arc<Worker>> {
        self.workers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BetSignalError::WorkerNotFound(name.to_string()))
    }

    pub async fn names(&self) -> Vec<String> {
        self.workers.read().await.keys().cloned().collect()
    }

    async fn all(&self) -> Vec<Arc<Worker>> {
        self.workers.read().await.values().cloned().collect()
    }

    pub async fn start(&self, name: &str) -> Result<bool> {
        Ok(self.get(name).await?.start().await)
    }

    pub async fn stop(&self, name: &str) -> Result<()> {
        self.get(name).await?.stop().await;
        Ok(())
    }

    pub async fn restart(&self, name: &str) -> Result<()> {
        let worker = self.get(name).await?;
        info!(worker = %name, delay_ms = self.restart_delay.as_millis() as u64, "Restarting worker");
        worker.stop().await;
        tokio::time::sleep(self.restart_delay).await;
        worker.start().await;
        Ok(())
    }

    /// Bypass the schedule and run one cycle now
    pub async fn run_once(&self, name: &str) -> Result<serde_json::Value> {
        self.get(name).await?.run_once().await
    }

    pub async fn set_interval(&self, name: &str, secs: u64) -> Result<()> {
        self.get(name).await?.set_interval(secs).await
    }

    pub async fn start_all(&self) {
        for worker in self.all().await {
            worker.start().await;
        }
    }

    pub async fn stop_all(&self) {
        let stops = self.all().await;
        futures::future::join_all(stops.iter().map(|w| w.stop())).await;
        info!("All workers stopped");
    }

    pub async fn states(&self) -> Vec<WorkerState> {
        let mut states = Vec::new();
        for worker in self.all().await {
            states.push(worker.state().await);
        }
        states
    }

    /// Healthy when every worker is running and has run at least once
    pub async fn report(&self) -> HealthReport {
        let workers = self.states().await;
        let unhealthy: Vec<String> = workers
            .iter()
            .filter(|s| !s.is_healthy())
            .map(|s| s.name.clone())
            .collect();
        HealthReport {
            healthy: unhealthy.is_empty(),
            unhealthy,
            workers,
        }
    }

    /// `report()` plus a SYSTEM/HIGH alert naming the unhealthy workers
    pub async fn health_check(&self) -> HealthReport {
        let report = self.report().await;
        if let Some(metrics) = &self.metrics {
            metrics.set_unhealthy_workers(report.unhealthy.len() as u64);
        }

        if !report.healthy {
            warn!(unhealthy = ?report.unhealthy, "Worker health check failed");
            if let Some(alerts) = &self.alerts {
                let alert = Alert::new(
                    AlertType::System,
                    AlertSeverity::High,
                    "Unhealthy workers",
                    &format!("Not running or never run: {}", report.unhealthy.join(", ")),
                )
                .with_metadata(serde_json::json!({ "workers": report.unhealthy }));
                alerts.raise(alert).await;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::WorkerJob;
    use async_trait::async_trait;

    struct NamedJob(&'static str);

    #[async_trait]
    impl WorkerJob for NamedJob {
        fn name(&self) -> &str {
            self.0
        }

        async fn do_work(&self) -> Result<serde_json::Value> {
            Ok(serde_json::json!({ "job": self.0 }))
        }
    }

    async fn manager_with(names: &[&'static str]) -> (WorkerManager, Arc<AlertEngine>) {
        let alerts = Arc::new(AlertEngine::new(100));
        let manager = WorkerManager::new(Duration::from_millis(10)).with_alerts(alerts.clone());
        for name in names {
            manager
                .register(Worker::new(Arc::new(NamedJob(name)), 60))
                .await;
        }
        (manager, alerts)
    }

    #[tokio::test]
    async fn test_unknown_worker() {
        let (manager, _) = manager_with(&["ingestion"]).await;
        let err = manager.start("nope").await.unwrap_err();
        assert!(matches!(err, BetSignalError::WorkerNotFound(_)));
    }

    #[tokio::test]
    async fn test_run_once_by_name() {
        let (manager, _) = manager_with(&["analysis"]).await;
        let value = manager.run_once("analysis").await.unwrap();
        assert_eq!(value["job"], "analysis");
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_names_unhealthy_workers() {
        let (manager, alerts) = manager_with(&["analysis", "ingestion"]).await;
        manager.start("analysis").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let report = manager.health_check().await;
        assert!(!report.healthy);
        assert_eq!(report.unhealthy, vec!["ingestion".to_string()]);

        let active = alerts.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].severity, AlertSeverity::High);
        assert!(active[0].message.contains("ingestion"));

        manager.start("ingestion").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(manager.health_check().await.healthy);

        manager.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_worker_running() {
        let (manager, _) = manager_with(&["alerts"]).await;
        manager.start("alerts").await.unwrap();
        manager.restart("alerts").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = manager.get("alerts").await.unwrap().state().await;
        assert!(state.is_healthy());
        manager.stop_all().await;
    }
}
