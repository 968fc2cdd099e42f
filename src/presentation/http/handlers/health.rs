//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe (is the server running?)
//! - `GET /health/ready` - Readiness probe with gateway load and stats

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::infrastructure::metrics::{ConnectionHealth, StatsSnapshot};
use crate::startup::AppState;

/// Basic health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: i64,
    pub started_at: String,
    pub websocket: WebSocketHealth,
    pub stats: StatsSnapshot,
}

/// WebSocket gateway health
#[derive(Debug, Serialize)]
pub struct WebSocketHealth {
    pub status: HealthStatus,
    pub load: ConnectionHealth,
    pub active_connections: usize,
    pub active_rooms: usize,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl From<ConnectionHealth> for HealthStatus {
    fn from(load: ConnectionHealth) -> Self {
        match load {
            ConnectionHealth::Overloaded => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Basic health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe - checks if the server is running
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe. Load is advisory, so an overloaded gateway reports
/// `degraded` but still answers 200.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.snapshot();
    let load = ConnectionHealth::classify(stats.active_connections);

    let websocket = WebSocketHealth {
        status: load.into(),
        load,
        active_connections: state.gateway.session_count(),
        active_rooms: state.gateway.room_count(),
    };

    let response = DetailedHealthResponse {
        status: websocket.status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: stats.uptime_seconds,
        started_at: stats.started_at.to_rfc3339(),
        websocket,
        stats,
    };

    (StatusCode::OK, Json(response))
}
