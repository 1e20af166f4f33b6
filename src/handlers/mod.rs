//! Built-in resource handlers mounted by the server binary.
//!
//! Embedding applications build their own [`HandlerRoutes`]; these give the
//! stock server something useful to route to.

pub mod rooms;
pub mod session;

pub use rooms::RoomHandler;
pub use session::SessionHandler;

use crate::router::HandlerRoutes;

/// Routes for the built-in handlers: `rooms` and `session`.
#[must_use]
pub fn default_routes() -> HandlerRoutes {
    HandlerRoutes::new()
        .route::<RoomHandler>("rooms")
        .route::<SessionHandler>("session")
}
