//! Invariants over the engine's observable state.
//!
//! Each check runs against a [`SystemSnapshot`]: the timeline and sidebar as
//! last rendered, plus the receipt and tombstone history accumulated since
//! the open conversation was last switched. The simulated world and the
//! recording driver run [`InvariantRegistry::standard`] after every step, so
//! a single inconsistent intermediate render fails the test that produced it.
//!
//! ```ignore
//! let mut history = SystemSnapshot::empty();
//! history.observe_engine(&engine);
//! InvariantRegistry::standard().check_all(&history)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    OpenConversationHasNoUnread, ReadReceiptMonotonicity, TimelineMatchesConversation,
    TimelineOrdered, TombstonesSticky, UniqueMessageIds,
};
pub use snapshot::{MessageSnapshot, SystemSnapshot, TimelineSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against system state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants checked together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Registry with no checks.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Every timeline and sidebar invariant:
    ///
    /// - [`UniqueMessageIds`]
    /// - [`TimelineOrdered`]
    /// - [`TimelineMatchesConversation`]
    /// - [`ReadReceiptMonotonicity`]
    /// - [`TombstonesSticky`]
    /// - [`OpenConversationHasNoUnread`]
    pub fn standard() -> Self {
        let invariants: Vec<Box<dyn Invariant>> = vec![
            Box::new(UniqueMessageIds),
            Box::new(TimelineOrdered),
            Box::new(TimelineMatchesConversation),
            Box::new(ReadReceiptMonotonicity),
            Box::new(TombstonesSticky),
            Box::new(OpenConversationHasNoUnread),
        ];
        Self { invariants }
    }

    /// Register another check.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Names of the registered checks, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.invariants.iter().map(|invariant| invariant.name())
    }

    /// Run every check. Collects all violations rather than stopping at the
    /// first.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> =
            self.invariants.iter().filter_map(|invariant| invariant.check(state).err()).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check and panic listing each violation. `context` says
    /// which step produced the state.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        let Err(violations) = self.check_all(state) else {
            return;
        };
        let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!("{} invariant(s) broken {context}:\n  {}", report.len(), report.join("\n  "));
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// True when no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
