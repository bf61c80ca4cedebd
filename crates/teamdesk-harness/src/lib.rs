//! Deterministic simulation harness for the Teamdesk sync engine.
//!
//! Simulated implementations of the Environment, Backend and Driver traits
//! for deterministic, reproducible testing of push/poll races.
//!
//! Two levels are offered:
//!
//! - [`SimWorld`] drives a bare [`teamdesk_sync::SyncEngine`] synchronously
//!   and lets a test complete backend calls in any order.
//! - [`SimBackend`] and [`SimDriver`] plug into the real
//!   [`teamdesk_app::Runtime`], typically under a paused tokio clock.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and real implementation,
//! and their observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for every
//! timeline and sidebar invariant.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_backend;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_world;
pub mod store;

pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, MessageSnapshot, OpenConversationHasNoUnread,
    ReadReceiptMonotonicity, SystemSnapshot, TimelineMatchesConversation, TimelineOrdered,
    TimelineSnapshot, TombstonesSticky, UniqueMessageIds, Violation,
};
pub use model::{
    Author, MODEL_CONVERSATIONS, ModelConversation, ModelInbox, ModelMessage, ObservableInbox,
    Operation, PushEffect, conversation_ref,
};
pub use sim_backend::{CallCounts, SimBackend};
pub use sim_driver::{Recorded, Recording, SimDriver, SimDriverError};
pub use sim_env::SimEnv;
pub use sim_world::{BACKGROUND_PERIOD, FOREGROUND_PERIOD, PendingCall, SimWorld};
pub use store::ServerStore;
