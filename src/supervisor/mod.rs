//! Supervision layer
//!
//! - Alert rule engine with cooldowns, bounded history and channel fan-out
//! - Worker: one periodic job with failure isolation
//! - Worker manager: named workers, restart, aggregate health

pub mod alerts;
pub mod worker;
pub mod worker_manager;

pub use alerts::{
    default_rules, Alert, AlertEngine, AlertRule, AlertSeverity, AlertType, RuleStatus,
};
pub use worker::{Worker, WorkerJob, WorkerPhase, WorkerState};
pub use worker_manager::{HealthReport, WorkerManager};
