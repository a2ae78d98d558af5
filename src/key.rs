//! Composite keys for per-caller state.
//!
//! State is tracked per `(identifier, caller_id)` pair. The pair is kept as a
//! structured key rather than a joined string, so `("a:b", None)` and
//! `("a", Some("b"))` never collide.

use std::fmt;

/// Key of one entry in the state store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateLimitKey {
    identifier: String,
    caller_id: Option<String>,
}

impl RateLimitKey {
    /// Create a new key.
    pub fn new(identifier: impl Into<String>, caller_id: Option<impl Into<String>>) -> Self {
        Self {
            identifier: identifier.into(),
            caller_id: caller_id.map(Into::into),
        }
    }

    /// Key shared by every caller of `identifier`.
    pub fn shared(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            caller_id: None,
        }
    }

    /// The quota class this key belongs to.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The caller, if the key is per-caller.
    pub fn caller_id(&self) -> Option<&str> {
        self.caller_id.as_deref()
    }
}

impl From<(&str, Option<&str>)> for RateLimitKey {
    fn from((identifier, caller_id): (&str, Option<&str>)) -> Self {
        Self::new(identifier, caller_id)
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.caller_id {
            Some(caller) => write!(f, "{}:{}", self.identifier, caller),
            None => f.write_str(&self.identifier),
        }
    }
}
