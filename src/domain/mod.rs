//! Domain layer: connections, subscription registry, and traffic logging.
//!
//! This module holds the server-side state shared by every session: the
//! [`Connection`] capability handed to handlers, the [`SubscriptionRegistry`]
//! that maps broadcast keys to member connections, and the [`LogSink`] that
//! keeps log I/O off the message path.

pub mod connection;
pub mod log_sink;
pub mod subscription_key;
pub mod subscription_registry;

pub use connection::{Connection, ConnectionId, WeakConnection};
pub use log_sink::{LogLevel, LogRecord, LogSink};
pub use subscription_key::{GLOBAL_KEY, SubscriptionKey};
pub use subscription_registry::SubscriptionRegistry;
