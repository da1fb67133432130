pub mod analysis;
pub mod health;
pub mod ingestion;
pub mod metrics;
pub mod monitor;

pub use analysis::{AnalysisJob, MAX_SEND_ATTEMPTS};
pub use health::{router, HealthResponse, StatusServer, StatusState};
pub use ingestion::IngestionJob;
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
pub use monitor::{AlertMonitorJob, HealthCheckJob};
