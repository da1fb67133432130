//! Status server
//!
//! `/health` answers 200 or 503 from the aggregate worker report, which makes
//! it usable as a liveness probe for process supervision (systemd/launchd).
//! The only mutating route is alert resolution.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use super::metrics::{MetricsSnapshot, RuntimeMetrics};
use crate::error::{BetSignalError, Result};
use crate::supervisor::{Alert, AlertEngine, HealthReport, WorkerManager};

const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub workers: HealthReport,
    pub metrics: MetricsSnapshot,
    pub active_alerts: usize,
}

/// Shared state for the status server
pub struct StatusState {
    pub started_at: DateTime<Utc>,
    pub workers: Arc<WorkerManager>,
    pub alerts: Arc<AlertEngine>,
    pub metrics: Arc<RuntimeMetrics>,
}

impl StatusState {
    pub fn new(
        workers: Arc<WorkerManager>,
        alerts: Arc<AlertEngine>,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        Self {
            started_at: Utc::now(),
            workers,
            alerts,
            metrics,
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let workers = self.workers.report().await;
        HealthResponse {
            status: if workers.healthy { "healthy" } else { "unhealthy" },
            timestamp: Utc::now(),
            uptime_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            workers,
            metrics: self.metrics.snapshot(),
            active_alerts: self.alerts.active().len(),
        }
    }
}

pub fn router(state: Arc<StatusState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/workers", get(workers_handler))
        .route("/alerts/active", get(active_alerts_handler))
        .route("/alerts/history", get(alert_history_handler))
        .route("/alerts/:id/resolve", post(resolve_alert_handler))
        .with_state(state)
}

pub struct StatusServer {
    state: Arc<StatusState>,
    port: u16,
}

impl StatusServer {
    pub fn new(state: Arc<StatusState>, port: u16) -> Self {
        Self { state, port }
    }

    pub async fn run(&self) -> Result<()> {
        let app = router(Arc::clone(&self.state));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting status server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| BetSignalError::Internal(format!("Status server error: {}", e)))?;

        Ok(())
    }
}

async fn health_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    let health = state.health().await;
    let status_code = if health.workers.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(health))
}

async fn workers_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    Json(state.workers.states().await)
}

async fn active_alerts_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    Json(state.alerts.active())
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn alert_history_handler(
    State(state): State<Arc<StatusState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.alerts.history(limit).await)
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    #[serde(default)]
    notes: String,
}

/// POST /alerts/:id/resolve
async fn resolve_alert_handler(
    State(state): State<Arc<StatusState>>,
    Path(id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> std::result::Result<Json<Alert>, (StatusCode, String)> {
    let key = id.trim();
    if key.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "alert id is required".to_string()));
    }
    state
        .alerts
        .resolve(key, request.notes.trim())
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "alert not active".to_string()))
}
