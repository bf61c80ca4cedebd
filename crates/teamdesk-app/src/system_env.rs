//! Production Environment implementation.
//!
//! `SystemEnv` reads time from `tokio::time`, so it follows the real clock in
//! production and the paused, auto-advancing clock in `start_paused` tests.

use teamdesk_core::env::Environment;

/// Production environment backed by `tokio::time`.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }
}
