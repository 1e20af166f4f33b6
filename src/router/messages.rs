//! Wire message types: inbound request and outbound response envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorCode, RouterError};

/// Client-chosen correlation identifier, echoed back unchanged.
///
/// Strings stay strings and numbers stay numbers (integers are not widened
/// to floats).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier.
    Text(String),
    /// Numeric identifier.
    Number(serde_json::Number),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(id.into())
    }
}

/// Validated inbound message addressed to a resource action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Resource name, resolved against the handler routes.
    pub resource: String,
    /// Action name within the resource's handler.
    pub action: String,
    /// Correlation identifier.
    pub request_id: RequestId,
    /// Optional action arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl IncomingMessage {
    /// Returns the `data` field `key`, if present.
    #[must_use]
    pub fn data_field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }

    /// Returns the `data` field `key` as a string slice, if present.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data_field(key).and_then(Value::as_str)
    }
}

/// Success or failure payload of a response, without the correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// The action's return value.
    Success {
        /// Handler result.
        data: Value,
    },
    /// Structured error.
    Failure {
        /// Client-visible error text.
        error: String,
        /// Error category.
        code: ErrorCode,
    },
}

impl ResponseBody {
    /// Builds the failure body for `err`.
    #[must_use]
    pub fn failure(err: &RouterError) -> Self {
        Self::Failure {
            error: err.client_message(),
            code: err.code(),
        }
    }
}

/// Outbound response: a [`ResponseBody`] plus the echoed `request_id`
/// (`null` when the request never got far enough to trust it).
///
/// ```json
/// { "data": {"k": "v"}, "request_id": "abc" }
/// { "error": "Unknown error", "code": "VALIDATION_ERROR", "request_id": 7 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingResponse {
    /// Success or failure payload.
    #[serde(flatten)]
    pub body: ResponseBody,
    /// Echoed correlation identifier.
    pub request_id: Option<RequestId>,
}

impl OutgoingResponse {
    /// Returns `true` for a success response.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.body, ResponseBody::Success { .. })
    }

    /// Returns the error code of a failure response.
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self.body {
            ResponseBody::Failure { code, .. } => Some(code),
            ResponseBody::Success { .. } => None,
        }
    }

    /// Returns the error text of a failure response.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Failure { error, .. } => Some(error),
            ResponseBody::Success { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_id_preserves_json_type() {
        let text: RequestId = serde_json::from_value(json!("test123")).unwrap_or(RequestId::from(0));
        assert_eq!(text, RequestId::from("test123"));

        let number: RequestId = serde_json::from_value(json!(99)).unwrap_or(RequestId::from(""));
        assert_eq!(serde_json::to_value(&number).ok(), Some(json!(99)));

        let float: RequestId = serde_json::from_value(json!(1.5)).unwrap_or(RequestId::from(""));
        assert_eq!(serde_json::to_value(&float).ok(), Some(json!(1.5)));
    }

    #[test]
    fn success_response_shape() {
        let response = OutgoingResponse {
            body: ResponseBody::Success {
                data: json!({"testkey": "testval"}),
            },
            request_id: Some(RequestId::from("test123")),
        };
        assert_eq!(
            serde_json::to_value(&response).ok(),
            Some(json!({"data": {"testkey": "testval"}, "request_id": "test123"}))
        );
    }

    #[test]
    fn failure_response_keeps_null_request_id() {
        let response = OutgoingResponse {
            body: ResponseBody::Failure {
                error: "Expected Json encodable string".to_string(),
                code: ErrorCode::ValidationError,
            },
            request_id: None,
        };
        assert_eq!(
            serde_json::to_value(&response).ok(),
            Some(json!({
                "error": "Expected Json encodable string",
                "code": "VALIDATION_ERROR",
                "request_id": null
            }))
        );
    }

    #[test]
    fn failure_response_parses_back() {
        let raw = json!({"error": "Unknown error", "code": "VALIDATION_ERROR", "request_id": 5});
        let Ok(parsed) = serde_json::from_value::<OutgoingResponse>(raw) else {
            panic!("failure response should parse");
        };
        assert!(!parsed.is_success());
        assert_eq!(parsed.code(), Some(ErrorCode::ValidationError));
        assert_eq!(parsed.error(), Some("Unknown error"));
        assert_eq!(parsed.request_id, Some(RequestId::from(5)));
    }

    #[test]
    fn data_accessors() {
        let msg = IncomingMessage {
            resource: "rooms".to_string(),
            action: "join".to_string(),
            request_id: RequestId::from(1),
            data: json!({"room": "room1"}).as_object().cloned(),
        };
        assert_eq!(msg.data_str("room"), Some("room1"));
        assert!(msg.data_field("missing").is_none());
    }
}
