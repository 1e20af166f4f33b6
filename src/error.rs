//! Router error types with wire error-code mapping.
//!
//! [`RouterError`] is the central per-message error type. Every variant maps
//! to an [`ErrorCode`] and a client-visible message; none of them is fatal to
//! the connection or the process.

use serde::{Deserialize, Serialize};

use crate::domain::ConnectionId;

/// Error code carried in the `code` field of a failure response.
///
/// Decode failures, schema failures and handler execution failures all
/// share [`ErrorCode::ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Default code: malformed payload, schema violation, or handler failure.
    #[default]
    ValidationError,
    /// The `resource` is not present in the handler routes.
    ResourceNotFound,
    /// The `action` is not defined by the resolved handler.
    ActionNotFound,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::ActionNotFound => "ACTION_NOT_FOUND",
        }
    }
}

/// Client-visible text for any failure raised inside a handler action.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Failure of a single inbound message.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The payload is not valid JSON.
    #[error("Expected Json encodable string")]
    Decode(#[source] serde_json::Error),

    /// The payload is JSON but violates the message schema.
    #[error("{0}")]
    Schema(String),

    /// No handler is registered for the resource.
    #[error("resource '{0}' not found in handler routes")]
    ResourceNotFound(String),

    /// The handler has no action with this name.
    #[error("action definition '{action}' not found in handler {handler}")]
    ActionNotFound {
        /// Requested action name.
        action: String,
        /// Name of the resolved handler.
        handler: &'static str,
    },

    /// The handler action returned an error or panicked.
    #[error("handler execution failed: {0:#}")]
    HandlerExecution(anyhow::Error),
}

impl RouterError {
    /// Returns the wire error code for this variant.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ResourceNotFound(_) => ErrorCode::ResourceNotFound,
            Self::ActionNotFound { .. } => ErrorCode::ActionNotFound,
            Self::Decode(_) | Self::Schema(_) | Self::HandlerExecution(_) => {
                ErrorCode::ValidationError
            }
        }
    }

    /// Returns the message sent to the client. Handler failures are reported
    /// as [`UNKNOWN_ERROR`]; their detail only reaches the operator log.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::HandlerExecution(_) => UNKNOWN_ERROR.to_string(),
            other => other.to_string(),
        }
    }

    /// Full diagnostic detail for operator logs.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::HandlerExecution(e) => format!("{e:?}"),
            Self::Decode(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

/// Failure of a subscription registry operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The serialized subscribe consumer has stopped.
    #[error("subscribe queue closed")]
    QueueClosed,
}

/// Failure to deliver to a [`crate::domain::Connection`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection was closed or its writer is gone.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The outbound queue has no free slot.
    #[error("outbound queue of connection {0} is full")]
    Full(ConnectionId),

    /// The outbound value could not be serialized.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_in_screaming_snake_case() {
        for code in [
            ErrorCode::ValidationError,
            ErrorCode::ResourceNotFound,
            ErrorCode::ActionNotFound,
        ] {
            let json = serde_json::to_string(&code).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn handler_failure_is_opaque_to_client() {
        let err = RouterError::HandlerExecution(anyhow::anyhow!("db password is hunter2"));
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.client_message(), UNKNOWN_ERROR);
        assert!(err.detail().contains("hunter2"));
    }

    #[test]
    fn not_found_messages_name_the_target() {
        let resource = RouterError::ResourceNotFound("invalid_resource".to_string());
        assert_eq!(resource.code(), ErrorCode::ResourceNotFound);
        assert_eq!(
            resource.client_message(),
            "resource 'invalid_resource' not found in handler routes"
        );

        let action = RouterError::ActionNotFound {
            action: "invalid_action".to_string(),
            handler: "EchoHandler",
        };
        assert_eq!(action.code(), ErrorCode::ActionNotFound);
        assert_eq!(
            action.client_message(),
            "action definition 'invalid_action' not found in handler EchoHandler"
        );
    }

    #[test]
    fn decode_failure_has_fixed_message() {
        let Err(e) = serde_json::from_str::<serde_json::Value>("not json") else {
            panic!("expected parse failure");
        };
        let err = RouterError::Decode(e);
        assert_eq!(err.client_message(), "Expected Json encodable string");
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
