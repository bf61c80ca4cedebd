//! Sync
//!
//! Action-based conversation synchronization engine. Keeps the open
//! conversation's timeline, the sidebar's unread counters and the poll timers
//! consistent while push events and periodic snapshots arrive in any order.
//!
//! # Architecture
//!
//! The engine follows the Sans-IO and Action-Based pattern. It receives
//! events ([`SyncEvent`]), processes them through pure state machine logic,
//! and returns actions ([`SyncAction`]) for the caller to execute. Network
//! calls, timers and rendering all live with the caller.
//!
//! # Components
//!
//! - [`SyncEngine`]: Top-level state machine
//! - [`Timeline`]: Reconciler for the open conversation
//! - [`Accountant`]: Unread counters and notification decisions
//! - [`PollScheduler`]: Generation-guarded foreground and background polls
//! - [`ReadReceiptCommitter`]: Fire-and-forget read receipts
//! - [`NotificationLedger`]: De-duplication between push and poll
//!   notifications

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod accountant;
mod engine;
mod error;
mod event;
mod ledger;
mod receipts;
mod scheduler;
mod timeline;

pub use accountant::Accountant;
pub use engine::{DEFAULT_NOTIFICATION_TTL, SyncConfig, SyncEngine};
pub use error::SyncError;
pub use event::{Cue, FetchOrigin, Notification, ReceiptOrigin, SyncAction, SyncEvent};
pub use ledger::NotificationLedger;
pub use receipts::{ReadReceiptCommitter, ReceiptCommit};
pub use scheduler::{Generation, PollScheduler, TickRejection};
pub use teamdesk_core::env::Environment;
pub use timeline::{DayBucket, MergeOutcome, ReplyTarget, Timeline};
