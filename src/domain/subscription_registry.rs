//! Subscription registry: key → member connections, with fan-out publish.
//!
//! [`SubscriptionRegistry`] owns the only shared mutable state of the
//! router. Mutation paths:
//!
//! - **subscribe** is funnelled through a single consumer task fed by a
//!   bounded queue, so concurrent opens are applied one at a time. Callers
//!   await the acknowledgement; the rest of the runtime keeps running.
//! - **unsubscribe** is an inline, idempotent discard-if-present.
//! - **publish** snapshots the member set and queues the message on each
//!   member without waiting. A member whose outbound buffer is full misses
//!   the message (counted in [`SubscriptionRegistry::dropped_messages`]), so
//!   a slow or dead subscriber never delays the others.
//!
//! A connection appears under a key if and only if that key is in the
//! connection's own subscribed-keys set. Both sides are updated while the
//! table's write lock is held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::connection::{Connection, ConnectionId, WeakConnection};
use super::SubscriptionKey;
use crate::error::{ConnectionError, RegistryError};

type Members = HashMap<ConnectionId, WeakConnection>;

#[derive(Debug, Default)]
struct SubscriptionTable {
    subscriptions: RwLock<HashMap<SubscriptionKey, Members>>,
}

impl SubscriptionTable {
    /// Adds `connection` under `key`. Skipped for closed connections so that
    /// a subscribe queued behind a close never resurrects membership.
    fn insert(&self, key: SubscriptionKey, connection: &Connection) -> bool {
        let mut map = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connection.is_closed() {
            return false;
        }
        map.entry(key.clone())
            .or_default()
            .insert(connection.id(), connection.downgrade());
        connection.with_keys(|keys| keys.insert(key));
        true
    }

    fn remove(&self, key: &str, connection: &Connection) -> bool {
        let mut map = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = map
            .get_mut(key)
            .is_some_and(|members| members.remove(&connection.id()).is_some());
        connection.with_keys(|keys| keys.remove(key));
        removed
    }

    fn remove_all(&self, connection: &Connection) -> usize {
        let mut map = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Snapshot first: the same set is drained below.
        let keys = connection.subscribed_keys();
        let mut removed = 0;
        for key in &keys {
            if let Some(members) = map.get_mut(key)
                && members.remove(&connection.id()).is_some()
            {
                removed += 1;
            }
            connection.with_keys(|own| own.remove(key));
        }
        removed
    }

    fn snapshot(&self, key: &str) -> Vec<Connection> {
        let map = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        map.get(key)
            .map(|members| members.values().filter_map(WeakConnection::upgrade).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct SubscribeCommand {
    key: SubscriptionKey,
    connection: Connection,
    done: oneshot::Sender<bool>,
}

/// Process-scoped registry of broadcast groups.
///
/// Cheap to clone; all clones share the same table and subscribe queue.
/// Construct one per application with [`SubscriptionRegistry::spawn`] and
/// inject it wherever subscribe/unsubscribe/publish is needed.
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry {
    table: Arc<SubscriptionTable>,
    subscribe_tx: mpsc::Sender<SubscribeCommand>,
    dropped: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry and spawns its subscribe consumer on the
    /// current Tokio runtime. The consumer exits once every clone of the
    /// registry has been dropped.
    #[must_use]
    pub fn spawn(queue_capacity: usize) -> Self {
        let table = Arc::new(SubscriptionTable::default());
        let (subscribe_tx, subscribe_rx) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(run_subscriber(Arc::clone(&table), subscribe_rx));
        Self {
            table,
            subscribe_tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Adds `connection` to the group `key`, waiting until the serialized
    /// consumer has applied the change. Subscribing twice has no further
    /// effect; subscribing a closed connection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::QueueClosed`] if the subscribe consumer is no
    /// longer running.
    pub async fn subscribe(
        &self,
        key: impl Into<SubscriptionKey>,
        connection: &Connection,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        let (done, applied) = oneshot::channel();
        self.subscribe_tx
            .send(SubscribeCommand {
                key: key.clone(),
                connection: connection.clone(),
                done,
            })
            .await
            .map_err(|_| RegistryError::QueueClosed)?;
        let inserted = applied.await.map_err(|_| RegistryError::QueueClosed)?;
        tracing::trace!(conn = %connection.id(), %key, inserted, "subscribe applied");
        Ok(())
    }

    /// Removes `connection` from the group `key`. No-op when the key or the
    /// membership does not exist. Returns `true` if a membership was removed.
    pub fn unsubscribe(&self, key: &str, connection: &Connection) -> bool {
        self.table.remove(key, connection)
    }

    /// Removes `connection` from every group it joined and returns how many
    /// memberships were dropped. Call after [`Connection::close`] so that
    /// pending subscribes for the connection are discarded.
    pub fn unsubscribe_all(&self, connection: &Connection) -> usize {
        self.table.remove_all(connection)
    }

    /// Sends `message` to every current member of `key`.
    ///
    /// The message is serialized once and queued on each member without
    /// waiting. Returns the number of members it was queued for (zero when
    /// nobody is subscribed). Members with a full outbound buffer are
    /// skipped and counted as dropped.
    pub fn publish<T: Serialize + ?Sized>(&self, key: &str, message: &T) -> usize {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%key, error = %e, "publish payload is not serializable");
                return 0;
            }
        };

        let mut queued = 0;
        for connection in self.table.snapshot(key) {
            match connection.try_send(text.clone()) {
                Ok(()) => queued += 1,
                Err(e @ ConnectionError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(%key, error = %e, "publish delivery dropped");
                }
                Err(e) => tracing::debug!(%key, error = %e, "publish delivery skipped"),
            }
        }
        queued
    }

    /// Number of broadcast deliveries dropped because a member's outbound
    /// buffer was full.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of live connections registered under `key`.
    /// Entries whose connection has already been dropped are not counted.
    #[must_use]
    pub fn member_count(&self, key: &str) -> usize {
        let map = self
            .table
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        map.get(key).map_or(0, |members| {
            members.values().filter(|m| m.is_alive()).count()
        })
    }

    /// Returns `true` if `connection` is registered under `key`.
    #[must_use]
    pub fn is_member(&self, key: &str, connection: &Connection) -> bool {
        let map = self
            .table
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        map.get(key)
            .is_some_and(|members| members.contains_key(&connection.id()))
    }

    /// Returns the number of keys ever subscribed to. Emptied keys are kept.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.table
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn run_subscriber(table: Arc<SubscriptionTable>, mut rx: mpsc::Receiver<SubscribeCommand>) {
    while let Some(cmd) = rx.recv().await {
        let inserted = table.insert(cmd.key, &cmd.connection);
        let _ = cmd.done.send(inserted);
    }
    tracing::debug!("subscribe queue closed");
}
