//! Inbound message dispatch.
//!
//! [`MessageRouter::on_message`] turns one raw payload into exactly one
//! [`OutgoingResponse`]. The pipeline is:
//!
//! 1. decode JSON → `VALIDATION_ERROR`, `request_id: null`
//! 2. validate schema → `VALIDATION_ERROR`, `request_id: null`
//! 3. extract `request_id` (echoed from here on)
//! 4. resolve resource → `RESOURCE_NOT_FOUND`
//! 5. construct the handler bound to the connection
//! 6. resolve action → `ACTION_NOT_FOUND`
//! 7. run the action → any error or panic becomes `"Unknown error"`
//!    (a panic while constructing the handler in step 5 is treated the same)
//! 8. wrap the result as `data`
//!
//! The request id is attached in one place after the pipeline returns, for
//! success and failure alike.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use super::handler::{HandlerContext, HandlerRoutes};
use super::messages::{IncomingMessage, OutgoingResponse, RequestId, ResponseBody};
use super::schema::validate_message;
use crate::domain::{Connection, LogLevel, LogSink, SubscriptionRegistry};
use crate::error::RouterError;

/// Validates, dispatches and answers inbound messages.
///
/// Cheap to clone; shared by every connection.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    routes: Arc<HandlerRoutes>,
    registry: SubscriptionRegistry,
    log: LogSink,
}

impl MessageRouter {
    /// Creates a router over `routes`, handing `registry` to every handler.
    #[must_use]
    pub fn new(routes: HandlerRoutes, registry: SubscriptionRegistry, log: LogSink) -> Self {
        Self {
            routes: Arc::new(routes),
            registry,
            log,
        }
    }

    /// The registry handed to handlers.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// The traffic log sink.
    #[must_use]
    pub fn log_sink(&self) -> &LogSink {
        &self.log
    }

    /// The registered handler routes.
    #[must_use]
    pub fn routes(&self) -> &HandlerRoutes {
        &self.routes
    }

    /// Handles one raw inbound payload from `connection`. Always returns a
    /// response; no failure here closes the connection.
    pub async fn on_message(&self, raw: &[u8], connection: &Connection) -> OutgoingResponse {
        self.log.info(String::from_utf8_lossy(raw));

        let mut request_id = None;
        let body = match self.dispatch(raw, connection, &mut request_id).await {
            Ok(data) => ResponseBody::Success { data },
            Err(e) => {
                self.log_failure(&e);
                ResponseBody::failure(&e)
            }
        };
        let response = OutgoingResponse { body, request_id };

        if self.log.enabled(LogLevel::Debug) {
            self.log.debug(format!(
                "sending response: {} to {}",
                serde_json::to_string(&response).unwrap_or_default(),
                connection.id()
            ));
        }
        response
    }

    async fn dispatch(
        &self,
        raw: &[u8],
        connection: &Connection,
        request_id: &mut Option<RequestId>,
    ) -> Result<Value, RouterError> {
        let value: Value = serde_json::from_slice(raw).map_err(RouterError::Decode)?;
        validate_message(&value).map_err(RouterError::Schema)?;
        let message: IncomingMessage =
            serde_json::from_value(value).map_err(|e| RouterError::Schema(e.to_string()))?;
        *request_id = Some(message.request_id.clone());

        let route = self
            .routes
            .resolve(&message.resource)
            .ok_or_else(|| RouterError::ResourceNotFound(message.resource.clone()))?;
        if self.log.enabled(LogLevel::Debug) {
            self.log.debug(format!(
                "handler {} found for resource {}",
                route.handler_name(),
                message.resource
            ));
        }

        let ctx = HandlerContext::new(connection.clone(), self.registry.clone());
        // Handler construction runs application code before any future exists.
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| route.invoke(ctx, message)));
        let action = match invoked {
            Ok(action) => action?,
            Err(payload) => return Err(handler_panic(payload.as_ref())),
        };

        match AssertUnwindSafe(action).catch_unwind().await {
            Ok(result) => result.map_err(RouterError::HandlerExecution),
            Err(payload) => Err(handler_panic(payload.as_ref())),
        }
    }

    fn log_failure(&self, err: &RouterError) {
        let level = match err {
            RouterError::HandlerExecution(_) => LogLevel::Error,
            _ => LogLevel::Warn,
        };
        self.log.emit(level, err.to_string(), Some(err.detail()));
    }
}

fn handler_panic(payload: &(dyn Any + Send)) -> RouterError {
    RouterError::HandlerExecution(anyhow::anyhow!(
        "handler panicked: {}",
        panic_message(payload)
    ))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
