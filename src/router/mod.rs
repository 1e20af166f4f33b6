//! Message routing: wire types, schema validation, handlers, dispatch.
//!
//! Inbound payloads name a resource and an action. [`MessageRouter`] checks
//! them against the message schema, resolves the resource in
//! [`HandlerRoutes`], builds a [`Handler`] bound to the sending connection,
//! runs the action, and returns an [`OutgoingResponse`] correlated by the
//! client's `request_id`.

pub mod handler;
pub mod message_router;
pub mod messages;
pub mod schema;

pub use handler::{
    ActionFuture, ActionResult, ActionTable, Handler, HandlerContext, HandlerRoutes,
};
pub use message_router::MessageRouter;
pub use messages::{IncomingMessage, OutgoingResponse, RequestId, ResponseBody};
pub use schema::validate_message;
