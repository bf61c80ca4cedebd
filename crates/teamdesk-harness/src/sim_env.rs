//! Virtual-time environment.
//!
//! `SimEnv` keeps a shared virtual clock that only moves when a test advances
//! it. Clones share the clock, so the engine and the test observe the same
//! time.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use teamdesk_core::env::Environment;

/// Deterministic environment with a manually advanced clock.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    elapsed_nanos: Arc<AtomicU64>,
}

impl SimEnv {
    /// Create an environment at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Virtual time elapsed since the start.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = Duration;

    fn now(&self) -> Self::Instant {
        self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        env.advance(Duration::from_secs(15));

        assert_eq!(other.now(), Duration::from_secs(15));
        assert_eq!(other.now() - Duration::from_secs(5), Duration::from_secs(10));
    }
}
