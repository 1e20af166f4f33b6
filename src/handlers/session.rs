//! `session` resource: introspect or end the caller's own connection.

use std::sync::Arc;

use serde_json::json;

use crate::router::{ActionResult, ActionTable, Handler, HandlerContext, IncomingMessage};

/// Actions on the sending connection itself.
#[derive(Debug)]
pub struct SessionHandler {
    ctx: HandlerContext,
}

impl Handler for SessionHandler {
    const NAME: &'static str = "SessionHandler";

    fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    fn actions() -> ActionTable<Self> {
        ActionTable::new()
            .action("info", Self::info)
            .action("echo", Self::echo)
            .action("close", Self::close)
    }
}

impl SessionHandler {
    async fn info(self: Arc<Self>, _message: IncomingMessage) -> ActionResult {
        let conn = self.ctx.connection();
        let mut keys = conn.subscribed_keys();
        keys.sort();
        Ok(json!({"connection_id": conn.id(), "subscriptions": keys}))
    }

    async fn echo(self: Arc<Self>, message: IncomingMessage) -> ActionResult {
        Ok(json!(message.data))
    }

    /// The response is still delivered; the socket closes right after.
    async fn close(self: Arc<Self>, _message: IncomingMessage) -> ActionResult {
        self.ctx.connection().close();
        Ok(json!({"closing": true}))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::domain::{Connection, GLOBAL_KEY, LogSink, SubscriptionRegistry};
    use crate::router::{HandlerRoutes, MessageRouter};

    #[tokio::test]
    async fn info_lists_subscriptions() {
        let Ok(log) = LogSink::start(1, 64) else {
            panic!("log sink should start");
        };
        let registry = SubscriptionRegistry::spawn(16);
        let router = MessageRouter::new(
            HandlerRoutes::new().route::<SessionHandler>("session"),
            registry.clone(),
            log,
        );
        let (conn, _rx) = Connection::new(8);
        tokio_test::assert_ok!(registry.subscribe(GLOBAL_KEY, &conn).await);
        tokio_test::assert_ok!(registry.subscribe("room1", &conn).await);

        let raw = json!({"resource": "session", "action": "info", "request_id": 3});
        let response = router.on_message(raw.to_string().as_bytes(), &conn).await;
        let value = serde_json::to_value(&response).unwrap_or_default();

        assert_eq!(value["data"]["subscriptions"], json!([GLOBAL_KEY, "room1"]));
        assert_eq!(value["data"]["connection_id"], json!(conn.id().to_string()));
        assert_eq!(value["request_id"], Value::from(3));
    }

    #[tokio::test]
    async fn close_marks_connection_closed() {
        let Ok(log) = LogSink::start(1, 64) else {
            panic!("log sink should start");
        };
        let router = MessageRouter::new(
            HandlerRoutes::new().route::<SessionHandler>("session"),
            SubscriptionRegistry::spawn(16),
            log,
        );
        let (conn, _rx) = Connection::new(8);
        let raw = json!({"resource": "session", "action": "close", "request_id": 4});
        let response = router.on_message(raw.to_string().as_bytes(), &conn).await;

        assert!(response.is_success());
        assert!(conn.is_closed());
    }
}
