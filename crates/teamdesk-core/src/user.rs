//! User identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, server-assigned user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The signed-in user on whose behalf the engine runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    /// User ID, compared against message senders and read receipts.
    pub id: UserId,
    /// Display name, used to detect `@mentions`.
    pub display_name: String,
}

impl LocalUser {
    /// Create a local user.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { id: UserId::new(id), display_name: display_name.into() }
    }
}
