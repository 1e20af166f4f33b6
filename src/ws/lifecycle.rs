//! Connection open/close hooks.
//!
//! Every connection joins [`GLOBAL_KEY`] when it opens and leaves every key
//! it joined when it closes.

use crate::domain::{Connection, GLOBAL_KEY, SubscriptionRegistry};
use crate::error::RegistryError;

/// Subscribes a freshly opened connection to the global key.
///
/// # Errors
///
/// Returns [`RegistryError::QueueClosed`] if the registry has shut down.
pub async fn on_open(
    registry: &SubscriptionRegistry,
    connection: &Connection,
) -> Result<(), RegistryError> {
    registry.subscribe(GLOBAL_KEY, connection).await?;
    tracing::debug!(conn = %connection.id(), "ws connection opened");
    Ok(())
}

/// Closes the connection and removes it from every key it joined. Returns the
/// number of memberships dropped.
pub fn on_close(registry: &SubscriptionRegistry, connection: &Connection) -> usize {
    connection.close();
    let removed = registry.unsubscribe_all(connection);
    tracing::debug!(conn = %connection.id(), removed, "ws connection closed");
    removed
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use futures_util::future::join_all;
    use tokio_test::assert_ok;

    use super::*;

    #[tokio::test]
    async fn open_joins_global_key() {
        let registry = SubscriptionRegistry::spawn(16);
        let (conn, _rx) = Connection::new(4);

        assert_ok!(on_open(&registry, &conn).await);

        assert!(registry.is_member(GLOBAL_KEY, &conn));
        assert!(conn.is_subscribed(GLOBAL_KEY));
    }

    #[tokio::test]
    async fn close_leaves_every_key() {
        let registry = SubscriptionRegistry::spawn(16);
        let (conn, _rx) = Connection::new(4);
        assert_ok!(on_open(&registry, &conn).await);
        assert_ok!(registry.subscribe("room1", &conn).await);

        assert_eq!(on_close(&registry, &conn), 2);

        assert!(conn.is_closed());
        assert!(conn.subscribed_keys().is_empty());
        assert_eq!(registry.member_count(GLOBAL_KEY), 0);
        assert_eq!(registry.member_count("room1"), 0);
    }

    #[tokio::test]
    async fn concurrent_opens_then_one_close() {
        let registry = SubscriptionRegistry::spawn(16);
        let (existing, _rx) = Connection::new(4);
        assert_ok!(on_open(&registry, &existing).await);
        let before = registry.member_count(GLOBAL_KEY);

        let conns: Vec<_> = (0..100).map(|_| Connection::new(4)).collect();
        let opened = join_all(conns.iter().map(|(conn, _)| on_open(&registry, conn))).await;
        assert!(opened.iter().all(Result::is_ok));
        assert_eq!(registry.member_count(GLOBAL_KEY), before + 100);

        let Some((last, _)) = conns.last() else {
            panic!("expected connections");
        };
        on_close(&registry, last);
        assert_eq!(registry.member_count(GLOBAL_KEY), before + 99);
    }

    #[tokio::test]
    async fn close_racing_pending_subscribe_leaves_no_membership() {
        let registry = SubscriptionRegistry::spawn(16);
        let (conn, _rx) = Connection::new(4);
        assert_ok!(on_open(&registry, &conn).await);

        let pending = {
            let registry = registry.clone();
            let conn = conn.clone();
            tokio::spawn(async move { registry.subscribe("room1", &conn).await })
        };
        on_close(&registry, &conn);
        assert!(matches!(pending.await, Ok(Ok(()))));

        assert!(!registry.is_member("room1", &conn));
        assert!(conn.subscribed_keys().is_empty());
    }
}
