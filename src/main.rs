//! pubsub-gateway server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket router and system
//! endpoints, mounting the built-in `rooms` and `session` handlers.

use tracing_subscriber::EnvFilter;

use pubsub_gateway::app_state::AppState;
use pubsub_gateway::config::{GatewayConfig, LogFormat};
use pubsub_gateway::domain::{LogSink, SubscriptionRegistry};
use pubsub_gateway::handlers::default_routes;
use pubsub_gateway::server::build_app;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting pubsub-gateway");

    // Build domain layer
    let registry = SubscriptionRegistry::spawn(config.subscribe_queue_capacity);
    let log = LogSink::start(config.log_workers, config.log_queue_capacity)?;

    // Build application state
    let app_state = AppState::new(default_routes(), registry, log, config.outbound_buffer);

    // Build router
    let app = build_app(app_state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
