//! Self-monitoring jobs: the alert rule tick and the worker health check.

use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::debug;

use super::metrics::RuntimeMetrics;
use crate::error::{BetSignalError, Result};
use crate::supervisor::{AlertEngine, WorkerJob, WorkerManager};

pub struct AlertMonitorJob {
    alerts: Arc<AlertEngine>,
    metrics: Arc<RuntimeMetrics>,
}

impl AlertMonitorJob {
    pub const NAME: &'static str = "alert_monitor";

    pub fn new(alerts: Arc<AlertEngine>, metrics: Arc<RuntimeMetrics>) -> Self {
        Self { alerts, metrics }
    }
}

#[async_trait]
impl WorkerJob for AlertMonitorJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn do_work(&self) -> Result<serde_json::Value> {
        let snapshot = self.metrics.snapshot();
        let fired = self.alerts.evaluate_rules(&snapshot).await;
        debug!(fired = fired.len(), "Alert rules evaluated");
        Ok(serde_json::json!({
            "fired": fired.iter().map(|a| a.id.clone()).collect::<Vec<_>>(),
            "active": self.alerts.active().len(),
        }))
    }
}

/// Holds the manager weakly: the manager owns the worker running this job
pub struct HealthCheckJob {
    manager: Weak<WorkerManager>,
    metrics: Arc<RuntimeMetrics>,
}

impl HealthCheckJob {
    pub const NAME: &'static str = "health_check";

    pub fn new(manager: &Arc<WorkerManager>, metrics: Arc<RuntimeMetrics>) -> Self {
        Self {
            manager: Arc::downgrade(manager),
            metrics,
        }
    }
}

#[async_trait]
impl WorkerJob for HealthCheckJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn do_work(&self) -> Result<serde_json::Value> {
        let manager = self.manager.upgrade().ok_or(BetSignalError::Cancelled)?;
        let report = manager.health_check().await;
        self.metrics.log_status();
        Ok(serde_json::json!({
            "healthy": report.healthy,
            "unhealthy": report.unhealthy,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertsConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_alert_monitor_fires_on_counters() {
        let alerts = Arc::new(AlertEngine::from_config(&AlertsConfig::default()));
        let metrics = Arc::new(RuntimeMetrics::new());
        metrics.set_active_matches(250);

        let job = AlertMonitorJob::new(alerts.clone(), metrics);
        let out = job.do_work().await.unwrap();
        assert_eq!(out["fired"].as_array().unwrap().len(), 1);
        assert_eq!(alerts.active()[0].title, "Too many active matches");

        // cooldown holds the second tick back
        let out = job.do_work().await.unwrap();
        assert!(out["fired"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_check_job_reports_idle_workers() {
        let metrics = Arc::new(RuntimeMetrics::new());
        let manager = Arc::new(WorkerManager::new(Duration::ZERO).with_metrics(metrics.clone()));
        let job = HealthCheckJob::new(&manager, metrics.clone());
        manager
            .register(crate::supervisor::Worker::new(
                Arc::new(AlertMonitorJob::new(
                    Arc::new(AlertEngine::new(10)),
                    metrics.clone(),
                )),
                60,
            ))
            .await;

        let out = job.do_work().await.unwrap();
        assert_eq!(out["healthy"], false);
        assert_eq!(metrics.snapshot().unhealthy_workers, 1);

        drop(manager);
        assert!(matches!(
            job.do_work().await.unwrap_err(),
            BetSignalError::Cancelled
        ));
    }
}
