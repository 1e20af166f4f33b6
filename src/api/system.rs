//! System endpoints: health check and registry statistics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::GLOBAL_KEY;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server answers.
    pub status: String,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
}

/// Router and registry statistics.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    /// Connections currently subscribed to the global key.
    pub connections: usize,
    /// Subscription keys known to the registry (emptied keys included).
    pub subscription_keys: usize,
    /// Registered resources.
    pub resources: usize,
    /// Traffic log records dropped because the log queue was full.
    pub log_records_dropped: u64,
    /// Broadcast deliveries dropped because a member's outbound buffer was full.
    pub broadcasts_dropped: u64,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /stats`: Connection and subscription counters.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Router statistics",
    description = "Returns the number of open connections, known subscription keys, registered resources, dropped log records and dropped broadcast deliveries.",
    responses(
        (status = 200, description = "Current counters", body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(StatsResponse {
            connections: state.registry.member_count(GLOBAL_KEY),
            subscription_keys: state.registry.key_count(),
            resources: state.router.routes().len(),
            log_records_dropped: state.router.log_sink().dropped(),
            broadcasts_dropped: state.registry.dropped_messages(),
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}
