//! Shared application state injected into all Axum handlers.

use crate::domain::{LogSink, SubscriptionRegistry};
use crate::router::{HandlerRoutes, MessageRouter};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Message router for every WebSocket session.
    pub router: MessageRouter,
    /// Subscription registry shared by the router and the lifecycle hooks.
    pub registry: SubscriptionRegistry,
    /// Per-connection outbound buffer size.
    pub outbound_buffer: usize,
}

impl AppState {
    /// Wires the registry, log sink and handler routes together.
    #[must_use]
    pub fn new(
        routes: HandlerRoutes,
        registry: SubscriptionRegistry,
        log: LogSink,
        outbound_buffer: usize,
    ) -> Self {
        let router = MessageRouter::new(routes, registry.clone(), log);
        Self {
            router,
            registry,
            outbound_buffer,
        }
    }
}
