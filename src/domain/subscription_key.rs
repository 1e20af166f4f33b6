//! Broadcast group identifier.
//!
//! [`SubscriptionKey`] is a newtype wrapper around an arbitrary string.
//! One reserved value, [`GLOBAL_KEY`], denotes every currently connected
//! client; each connection joins it automatically when it opens.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved key that every open connection is subscribed to.
pub const GLOBAL_KEY: &str = "__all__";

/// Name of a broadcast group in the [`super::SubscriptionRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Creates a key from any string-like value.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the reserved key meaning "all connected clients".
    #[must_use]
    pub fn global() -> Self {
        Self(GLOBAL_KEY.to_string())
    }

    /// Returns `true` if this is the reserved [`GLOBAL_KEY`].
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_KEY
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for SubscriptionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for SubscriptionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_is_reserved_value() {
        let key = SubscriptionKey::global();
        assert!(key.is_global());
        assert_eq!(key.as_str(), GLOBAL_KEY);
        assert!(!SubscriptionKey::from("room1").is_global());
    }

    #[test]
    fn lookup_by_str_in_hashmap() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(SubscriptionKey::from("room1"), 1);
        assert_eq!(map.get("room1"), Some(&1));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&SubscriptionKey::from("room1")).ok();
        assert_eq!(json.as_deref(), Some("\"room1\""));
    }
}
