//! Inbound message schema validation.
//!
//! Checks the decoded JSON against the message schema before any field is
//! trusted:
//!
//! ```text
//! required: resource, action, request_id
//! resource:   string
//! action:     string
//! request_id: string | number
//! data:       object (optional)
//! ```
//!
//! Error texts follow JSON-Schema wording so clients can match on the
//! offending field.

use serde_json::Value;

const REQUIRED: [&str; 3] = ["resource", "action", "request_id"];
const STRING_FIELDS: [&str; 2] = ["resource", "action"];

/// Validates `message` against the inbound message schema.
///
/// # Errors
///
/// Returns a description of the first violated constraint.
pub fn validate_message(message: &Value) -> Result<(), String> {
    let Some(object) = message.as_object() else {
        return Err(format!("{message} is not of type 'object'"));
    };

    for field in REQUIRED {
        if !object.contains_key(field) {
            return Err(format!("'{field}' is a required property"));
        }
    }

    for field in STRING_FIELDS {
        if let Some(value) = object.get(field)
            && !value.is_string()
        {
            return Err(format!("{value} is not of type 'string' (field '{field}')"));
        }
    }

    if let Some(value) = object.get("request_id")
        && !(value.is_string() || value.is_number())
    {
        return Err(format!(
            "{value} is not of type 'string' or 'number' (field 'request_id')"
        ));
    }

    if let Some(value) = object.get("data")
        && !value.is_object()
    {
        return Err(format!("{value} is not of type 'object' (field 'data')"));
    }

    Ok(())
}
