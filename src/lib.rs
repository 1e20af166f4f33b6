//! # pubsub-gateway
//!
//! Message routing and publish/subscribe broadcast over long-lived
//! WebSocket connections.
//!
//! Clients send `{resource, action, request_id, data?}` messages. The
//! [`router::MessageRouter`] validates them, dispatches to the
//! application's [`router::Handler`] for the resource, and answers with
//! `{data, request_id}` or `{error, code, request_id}`. Handlers can join
//! their connection to named broadcast groups and publish to any group
//! through the [`domain::SubscriptionRegistry`].
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Handler + lifecycle (ws/)
//!     ├── System endpoints (api/)
//!     │
//!     ├── MessageRouter → HandlerRoutes → Handler actions (router/, handlers/)
//!     │
//!     ├── SubscriptionRegistry (domain/)
//!     └── LogSink worker pool (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod ws;
