//! WebSocket layer: upgrade handler, connection loop, lifecycle hooks.
//!
//! The WebSocket endpoint at `/ws` carries resource/action requests from the
//! client and pushes responses and broadcasts back.

pub mod connection;
pub mod handler;
pub mod lifecycle;
