//! Supervised periodic job.
//!
//! A `Worker` runs one `WorkerJob` on a fixed interval. Every cycle is
//! isolated: an error or a panic becomes a failed cycle plus a SYSTEM alert,
//! and the next tick is the only retry. Stopping interrupts the sleep between
//! cycles and abandons a cycle still in flight.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::alerts::{Alert, AlertEngine, AlertSeverity, AlertType};
use crate::config::MAX_WORKER_INTERVAL_SECS;
use crate::error::{BetSignalError, Result};
use crate::services::RuntimeMetrics;

/// The unit of work a worker schedules
#[async_trait]
pub trait WorkerJob: Send + Sync {
    fn name(&self) -> &str;

    /// One cycle; the returned value is kept as the worker's last output
    async fn do_work(&self) -> Result<serde_json::Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    Idle,
    Running,
    Stopping,
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerPhase::Idle => write!(f, "idle"),
            WorkerPhase::Running => write!(f, "running"),
            WorkerPhase::Stopping => write!(f, "stopping"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerState {
    pub name: String,
    pub phase: WorkerPhase,
    pub interval_seconds: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_output: Option<serde_json::Value>,
    pub consecutive_failures: u32,
    pub total_runs: u64,
    pub total_failures: u64,
}

impl WorkerState {
    fn new(name: &str, interval_seconds: u64) -> Self {
        Self {
            name: name.to_string(),
            phase: WorkerPhase::Idle,
            interval_seconds,
            last_run_at: None,
            next_run_at: None,
            last_error: None,
            last_output: None,
            consecutive_failures: 0,
            total_runs: 0,
            total_failures: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == WorkerPhase::Running
    }

    /// Running and has completed at least one cycle start
    pub fn is_healthy(&self) -> bool {
        self.is_running() && self.last_run_at.is_some()
    }
}

/// Shared between the scheduling task and direct `run_once` calls
struct WorkerCore {
    name: String,
    job: Arc<dyn WorkerJob>,
    state: RwLock<WorkerState>,
    interval_secs: AtomicU64,
    escalate_after: u32,
    alerts: Option<Arc<AlertEngine>>,
    metrics: Option<Arc<RuntimeMetrics>>,
}

impl WorkerCore {
    async fn execute(&self) -> Result<serde_json::Value> {
        let started = Utc::now();
        self.state.write().await.last_run_at = Some(started);
        debug!(worker = %self.name, "Cycle started");

        let outcome = match AssertUnwindSafe(self.job.do_work()).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(outcome.is_ok());
        }

        match outcome {
            Ok(value) => {
                let mut state = self.state.write().await;
                state.total_runs += 1;
                state.consecutive_failures = 0;
                state.last_error = None;
                state.last_output = Some(value.clone());
                debug!(
                    worker = %self.name,
                    elapsed_ms = (Utc::now() - started).num_milliseconds(),
                    "Cycle finished"
                );
                Ok(value)
            }
            Err(reason) => {
                let failures = {
                    let mut state = self.state.write().await;
                    state.total_runs += 1;
                    state.total_failures += 1;
                    state.consecutive_failures += 1;
                    state.last_error = Some(reason.clone());
                    state.consecutive_failures
                };
                error!(worker = %self.name, consecutive_failures = failures, "Cycle failed: {}", reason);
                self.raise_failure(&reason, failures).await;
                Err(BetSignalError::WorkerCycle {
                    worker: self.name.clone(),
                    reason,
                })
            }
        }
    }

    async fn raise_failure(&self, reason: &str, failures: u32) {
        let Some(alerts) = &self.alerts else {
            return;
        };
        let severity = if self.escalate_after > 0 && failures >= self.escalate_after {
            AlertSeverity::Critical
        } else {
            AlertSeverity::High
        };
        let alert = Alert::new(
            AlertType::System,
            severity,
            &format!("Worker {} failed", self.name),
            reason,
        )
        .with_metadata(serde_json::json!({
            "worker": self.name,
            "consecutive_failures": failures,
        }));
        alerts.raise(alert).await;
    }

    async fn run_loop(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        info!(worker = %self.name, "Worker loop started");
        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = self.execute() => {}
            }

            let interval = self.interval_secs.load(Ordering::SeqCst);
            let next = i64::try_from(interval)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|delay| Utc::now().checked_add_signed(delay));
            if next.is_none() {
                warn!(worker = %self.name, interval_secs = interval, "Next run time not representable");
            }
            self.state.write().await.next_run_at = next;

            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            }
        }
        info!(worker = %self.name, "Worker loop exited");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

pub struct Worker {
    core: Arc<WorkerCore>,
    task: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl Worker {
    pub fn new(job: Arc<dyn WorkerJob>, interval_secs: u64) -> Self {
        let name = job.name().to_string();
        Self {
            core: Arc::new(WorkerCore {
                state: RwLock::new(WorkerState::new(&name, interval_secs)),
                name,
                job,
                interval_secs: AtomicU64::new(interval_secs),
                escalate_after: 0,
                alerts: None,
                metrics: None,
            }),
            task: Mutex::new(None),
        }
    }

    fn core_mut(&mut self) -> Option<&mut WorkerCore> {
        Arc::get_mut(&mut self.core)
    }

    /// Failure alerts go to `alerts`
    pub fn with_alerts(mut self, alerts: Arc<AlertEngine>) -> Self {
        if let Some(core) = self.core_mut() {
            core.alerts = Some(alerts);
        }
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RuntimeMetrics>) -> Self {
        if let Some(core) = self.core_mut() {
            core.metrics = Some(metrics);
        }
        self
    }

    /// Consecutive failures at which the alert becomes CRITICAL (0 = never)
    pub fn escalate_after(mut self, failures: u32) -> Self {
        if let Some(core) = self.core_mut() {
            core.escalate_after = failures;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Spawn the schedule. Returns false if it was already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if let Some((_, handle)) = task.as_ref() {
            if !handle.is_finished() {
                debug!(worker = %self.core.name, "Start ignored, already running");
                return false;
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.core.state.write().await.phase = WorkerPhase::Running;
        let handle = tokio::spawn(self.core.clone().run_loop(stop_rx));
        *task = Some((stop_tx, handle));
        info!(
            worker = %self.core.name,
            interval_secs = self.core.interval_secs.load(Ordering::SeqCst),
            "Worker started"
        );
        true
    }

    /// Cancel the schedule and wait for the loop to exit.
    /// No cycle starts after this returns.
    pub async fn stop(&self) {
        let Some((stop_tx, handle)) = self.task.lock().await.take() else {
            return;
        };

        self.core.state.write().await.phase = WorkerPhase::Stopping;
        let _ = stop_tx.send(true);
        if let Err(e) = handle.await {
            warn!(worker = %self.core.name, error = %e, "Worker task ended abnormally");
        }

        let mut state = self.core.state.write().await;
        state.phase = WorkerPhase::Idle;
        state.next_run_at = None;
        info!(worker = %self.core.name, "Worker stopped");
    }

    /// One cycle now, outside the schedule
    pub async fn run_once(&self) -> Result<serde_json::Value> {
        self.core.execute().await
    }

    /// Takes effect from the next sleep. Zero and anything above a day are rejected.
    pub async fn set_interval(&self, secs: u64) -> Result<()> {
        if secs == 0 || secs > MAX_WORKER_INTERVAL_SECS {
            return Err(BetSignalError::Validation(format!(
                "interval for {} must be between 1 and {} seconds, got {}",
                self.core.name, MAX_WORKER_INTERVAL_SECS, secs
            )));
        }
        self.core.interval_secs.store(secs, Ordering::SeqCst);
        self.core.state.write().await.interval_seconds = secs;
        info!(worker = %self.core.name, interval_secs = secs, "Interval updated");
        Ok(())
    }

    /// Current state. A Running worker whose loop task has ended is
    /// demoted to Idle here, so health checks see it.
    pub async fn state(&self) -> WorkerState {
        if self.loop_exited().await {
            let mut state = self.core.state.write().await;
            if state.phase == WorkerPhase::Running {
                error!(worker = %self.core.name, "Schedule loop exited while running");
                state.phase = WorkerPhase::Idle;
                state.next_run_at = None;
                state.last_error = Some("schedule loop exited unexpectedly".to_string());
            }
            return state.clone();
        }
        self.core.state.read().await.clone()
    }

    /// The spawned loop finished without `stop` taking it
    async fn loop_exited(&self) -> bool {
        matches!(self.task.lock().await.as_ref(), Some((_, handle)) if handle.is_finished())
    }
}
