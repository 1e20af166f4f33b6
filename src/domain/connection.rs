//! Client session capability.
//!
//! A [`Connection`] represents one transport-level session. It can accept
//! outbound messages, tracks the subscription keys it currently belongs to,
//! and can be closed from either side. Identity is by reference: two
//! `Connection` values are equal only if they are clones of the same
//! session.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::SubscriptionKey;
use crate::error::ConnectionError;

/// Unique identifier of a connection, used for logging and registry
/// bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct ConnectionInner {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
    subscribed_keys: Mutex<HashSet<SubscriptionKey>>,
    closed: watch::Sender<bool>,
}

/// Cloneable handle to a single client session.
///
/// Owned by the transport layer. The [`super::SubscriptionRegistry`] only
/// keeps non-owning references (see [`WeakConnection`]).
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Creates a connection whose outbound messages are delivered to the
    /// returned receiver. `buffer` bounds the number of queued messages.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(buffer.max(1));
        let (closed, _) = watch::channel(false);
        let conn = Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::new(),
                outbound,
                subscribed_keys: Mutex::new(HashSet::new()),
                closed,
            }),
        };
        (conn, rx)
    }

    /// Returns the connection identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Queues a text message for delivery to the client, waiting for room
    /// in the outbound buffer. Messages queued before the transport writer
    /// shuts down are still flushed after [`Connection::close`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] if the transport writer is gone.
    pub async fn send(&self, text: String) -> Result<(), ConnectionError> {
        self.inner
            .outbound
            .send(text)
            .await
            .map_err(|_| ConnectionError::Closed(self.id()))
    }

    /// Queues a text message without waiting. Used for broadcasts, where a
    /// client that stops reading must not hold anything up.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Full`] if the outbound buffer has no room,
    /// or [`ConnectionError::Closed`] if the transport writer is gone.
    pub fn try_send(&self, text: String) -> Result<(), ConnectionError> {
        self.inner.outbound.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ConnectionError::Full(self.id()),
            mpsc::error::TrySendError::Closed(_) => ConnectionError::Closed(self.id()),
        })
    }

    /// Serializes `value` as JSON and queues it for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Encode`] if serialization fails, or
    /// [`ConnectionError::Closed`] if the connection is closed.
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ConnectionError> {
        let text = serde_json::to_string(value)?;
        self.send(text).await
    }

    /// Returns a snapshot of the keys this connection is subscribed to.
    #[must_use]
    pub fn subscribed_keys(&self) -> Vec<SubscriptionKey> {
        self.with_keys(|keys| keys.iter().cloned().collect())
    }

    /// Returns `true` if the connection is currently subscribed to `key`.
    #[must_use]
    pub fn is_subscribed(&self, key: &str) -> bool {
        self.with_keys(|keys| keys.contains(key))
    }

    /// Marks the connection closed. The transport stops reading, sends a
    /// close frame, and runs the close lifecycle. Idempotent.
    pub fn close(&self) {
        self.inner.closed.send_replace(true);
    }

    /// Returns `true` once [`Connection::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a drop.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub(crate) fn with_keys<R>(&self, f: impl FnOnce(&mut HashSet<SubscriptionKey>) -> R) -> R {
        let mut keys = self
            .inner
            .subscribed_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut keys)
    }

    pub(crate) fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            id: self.id(),
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

/// Non-owning reference to a [`Connection`] held by the registry.
#[derive(Debug, Clone)]
pub struct WeakConnection {
    id: ConnectionId,
    inner: Weak<ConnectionInner>,
}

impl WeakConnection {
    /// Identifier of the referenced connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` while the transport still holds the connection.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Returns the connection if the transport still holds it.
    #[must_use]
    pub fn upgrade(&self) -> Option<Connection> {
        self.inner.upgrade().map(|inner| Connection { inner })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (conn, mut rx) = Connection::new(4);
        let sent = conn.send("hello".to_string()).await;
        assert!(sent.is_ok());
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn send_json_serializes_value() {
        let (conn, mut rx) = Connection::new(4);
        let sent = conn.send_json(&serde_json::json!({"k": "v"})).await;
        assert!(sent.is_ok());
        let Some(text) = rx.recv().await else {
            panic!("expected outbound message");
        };
        assert_eq!(text, r#"{"k":"v"}"#);
    }

    #[tokio::test]
    async fn close_keeps_queued_output() {
        let (conn, mut rx) = Connection::new(4);
        conn.close();
        assert!(conn.is_closed());
        assert!(conn.send("goodbye".to_string()).await.is_ok());
        assert_eq!(rx.recv().await.as_deref(), Some("goodbye"));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (conn, rx) = Connection::new(4);
        drop(rx);
        let result = conn.send("x".to_string()).await;
        assert!(matches!(result, Err(ConnectionError::Closed(_))));
    }

    #[test]
    fn try_send_reports_full_buffer() {
        let (conn, mut rx) = Connection::new(1);
        assert!(conn.try_send("first".to_string()).is_ok());
        let second = conn.try_send("second".to_string());
        assert!(matches!(second, Err(ConnectionError::Full(id)) if id == conn.id()));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("first"));
        drop(rx);
        assert!(matches!(
            conn.try_send("third".to_string()),
            Err(ConnectionError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let (conn, _rx) = Connection::new(4);
        let waiter = conn.clone();
        let task = tokio::spawn(async move { waiter.closed().await });
        conn.close();
        assert!(task.await.is_ok());
        // Already closed: resolves immediately.
        conn.closed().await;
    }

    #[test]
    fn equality_is_by_reference() {
        let (a, _rx_a) = Connection::new(1);
        let (b, _rx_b) = Connection::new(1);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn weak_reference_does_not_keep_connection_alive() {
        let (conn, _rx) = Connection::new(1);
        let weak = conn.downgrade();
        assert_eq!(weak.id(), conn.id());
        assert!(weak.upgrade().is_some());
        assert!(weak.is_alive());
        drop(conn);
        assert!(weak.upgrade().is_none());
        assert!(!weak.is_alive());
    }
}
