//! Handler abstraction: per-message handler instances and their actions.
//!
//! Applications implement [`Handler`] for each resource and register it in
//! [`HandlerRoutes`]. A handler declares its callable actions explicitly in
//! an [`ActionTable`]; only names in that table can be dispatched, so no
//! other method or field of the handler is ever reachable from the wire.
//!
//! ```ignore
//! struct EchoHandler { ctx: HandlerContext }
//!
//! impl Handler for EchoHandler {
//!     const NAME: &'static str = "EchoHandler";
//!     fn new(ctx: HandlerContext) -> Self { Self { ctx } }
//!     fn actions() -> ActionTable<Self> {
//!         ActionTable::new().action("get", Self::get)
//!     }
//! }
//!
//! impl EchoHandler {
//!     async fn get(self: Arc<Self>, msg: IncomingMessage) -> ActionResult {
//!         Ok(json!({ "echo": msg.data }))
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use super::messages::IncomingMessage;
use crate::domain::{Connection, SubscriptionKey, SubscriptionRegistry};
use crate::error::{RegistryError, RouterError};

/// Return type of a handler action.
pub type ActionResult = anyhow::Result<Value>;

/// Boxed future produced by invoking an action.
pub type ActionFuture = BoxFuture<'static, ActionResult>;

type ActionFn<H> = Box<dyn Fn(Arc<H>, IncomingMessage) -> ActionFuture + Send + Sync>;

/// Capabilities available to a handler bound to one connection.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    connection: Connection,
    registry: SubscriptionRegistry,
}

impl HandlerContext {
    /// Binds a context to `connection`.
    #[must_use]
    pub fn new(connection: Connection, registry: SubscriptionRegistry) -> Self {
        Self {
            connection,
            registry,
        }
    }

    /// The connection that sent the message being handled.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The shared subscription registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Subscribes the bound connection to `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::QueueClosed`] if the registry has shut down.
    pub async fn subscribe(&self, key: impl Into<SubscriptionKey>) -> Result<(), RegistryError> {
        self.registry.subscribe(key, &self.connection).await
    }

    /// Unsubscribes the bound connection from `key`.
    pub fn unsubscribe(&self, key: &str) -> bool {
        self.registry.unsubscribe(key, &self.connection)
    }

    /// Publishes `message` to every member of `key`.
    pub fn publish<T: Serialize + ?Sized>(&self, key: &str, message: &T) -> usize {
        self.registry.publish(key, message)
    }
}

/// Explicit mapping from action name to handler method.
pub struct ActionTable<H> {
    actions: HashMap<&'static str, ActionFn<H>>,
}

impl<H: Send + Sync + 'static> ActionTable<H> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Registers `action` under `name`. A later registration with the same
    /// name replaces the earlier one.
    #[must_use]
    pub fn action<F, Fut>(mut self, name: &'static str, action: F) -> Self
    where
        F: Fn(Arc<H>, IncomingMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.actions.insert(
            name,
            Box::new(move |handler: Arc<H>, message: IncomingMessage| {
                action(handler, message).boxed()
            }),
        );
        self
    }

    /// Returns `true` if `name` is a registered action.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Returns the registered action names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.actions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn get(&self, name: &str) -> Option<&ActionFn<H>> {
        self.actions.get(name)
    }
}

impl<H: Send + Sync + 'static> Default for ActionTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for ActionTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actions.keys()).finish()
    }
}

/// A resource handler. One instance is constructed per inbound message,
/// bound to the sending connection, and dropped afterwards.
pub trait Handler: Sized + Send + Sync + 'static {
    /// Handler name used in `ACTION_NOT_FOUND` errors and logs.
    const NAME: &'static str;

    /// Constructs a handler bound to the sending connection.
    fn new(ctx: HandlerContext) -> Self;

    /// Declares the actions this handler exposes.
    fn actions() -> ActionTable<Self>;
}

/// Type-erased route entry.
pub(crate) trait Route: Send + Sync {
    fn handler_name(&self) -> &'static str;

    /// Constructs the handler, resolves the action and starts it.
    fn invoke(
        &self,
        ctx: HandlerContext,
        message: IncomingMessage,
    ) -> Result<ActionFuture, RouterError>;
}

struct TypedRoute<H: Handler> {
    actions: ActionTable<H>,
}

impl<H: Handler> Route for TypedRoute<H> {
    fn handler_name(&self) -> &'static str {
        H::NAME
    }

    fn invoke(
        &self,
        ctx: HandlerContext,
        message: IncomingMessage,
    ) -> Result<ActionFuture, RouterError> {
        let handler = Arc::new(H::new(ctx));
        let Some(action) = self.actions.get(&message.action) else {
            return Err(RouterError::ActionNotFound {
                action: message.action,
                handler: H::NAME,
            });
        };
        Ok(action(handler, message))
    }
}

/// Resource name → handler mapping supplied by the embedding application.
#[derive(Default)]
pub struct HandlerRoutes {
    routes: HashMap<String, Arc<dyn Route>>,
}

impl HandlerRoutes {
    /// Creates an empty route table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers handler `H` for `resource`. The handler's action table is
    /// built once here.
    #[must_use]
    pub fn route<H: Handler>(mut self, resource: impl Into<String>) -> Self {
        let route = TypedRoute::<H> {
            actions: H::actions(),
        };
        self.routes.insert(resource.into(), Arc::new(route));
        self
    }

    /// Returns `true` if a handler is registered for `resource`.
    #[must_use]
    pub fn contains(&self, resource: &str) -> bool {
        self.routes.contains_key(resource)
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no resource is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn resolve(&self, resource: &str) -> Option<&dyn Route> {
        self.routes.get(resource).map(AsRef::as_ref)
    }
}

impl fmt::Debug for HandlerRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.routes
                    .iter()
                    .map(|(resource, route)| (resource, route.handler_name())),
            )
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::router::RequestId;

    #[derive(Debug)]
    struct Widget {
        ctx: HandlerContext,
    }

    impl Handler for Widget {
        const NAME: &'static str = "Widget";

        fn new(ctx: HandlerContext) -> Self {
            Self { ctx }
        }

        fn actions() -> ActionTable<Self> {
            ActionTable::new()
                .action("get", Self::get)
                .action("whoami", Self::whoami)
        }
    }

    impl Widget {
        async fn get(self: Arc<Self>, _message: IncomingMessage) -> ActionResult {
            Ok(json!({"testkey": "testval"}))
        }

        async fn whoami(self: Arc<Self>, _message: IncomingMessage) -> ActionResult {
            Ok(json!(self.ctx.connection().id().to_string()))
        }
    }

    fn message(action: &str) -> IncomingMessage {
        IncomingMessage {
            resource: "widget".to_string(),
            action: action.to_string(),
            request_id: RequestId::from(1),
            data: None,
        }
    }

    #[test]
    fn action_table_lists_only_registered_names() {
        let table = Widget::actions();
        assert_eq!(table.names(), vec!["get", "whoami"]);
        assert!(table.contains("get"));
        assert!(!table.contains("ctx"));
        assert!(!table.contains("new"));
    }

    #[tokio::test]
    async fn route_invokes_registered_action() {
        let routes = HandlerRoutes::new().route::<Widget>("widget");
        let registry = SubscriptionRegistry::spawn(4);
        let (conn, _rx) = Connection::new(4);
        let Some(route) = routes.resolve("widget") else {
            panic!("route should resolve");
        };
        assert_eq!(route.handler_name(), "Widget");

        let ctx = HandlerContext::new(conn.clone(), registry);
        let Ok(action) = route.invoke(ctx, message("whoami")) else {
            panic!("action should resolve");
        };
        let Ok(value) = action.await else {
            panic!("action should succeed");
        };
        assert_eq!(value, json!(conn.id().to_string()));
    }

    #[tokio::test]
    async fn route_rejects_unknown_action() {
        let routes = HandlerRoutes::new().route::<Widget>("widget");
        let registry = SubscriptionRegistry::spawn(4);
        let (conn, _rx) = Connection::new(4);
        let Some(route) = routes.resolve("widget") else {
            panic!("route should resolve");
        };

        let result = route.invoke(HandlerContext::new(conn, registry), message("ctx"));
        let Err(RouterError::ActionNotFound { action, handler }) = result else {
            panic!("expected ActionNotFound");
        };
        assert_eq!(action, "ctx");
        assert_eq!(handler, "Widget");
    }

    #[test]
    fn routes_report_membership() {
        let routes = HandlerRoutes::new().route::<Widget>("widget");
        assert!(routes.contains("widget"));
        assert!(!routes.contains("other"));
        assert_eq!(routes.len(), 1);
        assert!(!routes.is_empty());
        assert!(routes.resolve("other").is_none());
    }
}
