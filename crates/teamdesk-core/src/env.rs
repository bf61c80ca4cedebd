//! Environment abstraction for deterministic testing.
//!
//! Decouples sync logic from the system clock. Simulation plugs in a virtual
//! clock that only moves when the test advances it; production uses
//! `tokio::time`, which also honours paused time in async tests.

use std::time::Duration;

/// Abstract environment providing monotonic time.
///
/// # Invariants
///
/// - `now()` never goes backwards within one execution context.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `tokio::time::Instant`, simulation uses a
    /// virtual offset from the start of the run. Subtracting two instants
    /// gives the span the notification ledger measures its TTL against.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;
}
