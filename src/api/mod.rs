//! HTTP API layer: system endpoints and their OpenAPI description.

pub mod system;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the HTTP endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "pubsub-gateway", description = "WebSocket message router with publish/subscribe broadcast"),
    paths(system::health_handler, system::stats_handler),
    components(schemas(system::HealthResponse, system::StatsResponse)),
    tags((name = "System", description = "Health and statistics"))
)]
pub struct ApiDoc;

/// Builds the HTTP router with all system endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new().merge(system::routes())
}
