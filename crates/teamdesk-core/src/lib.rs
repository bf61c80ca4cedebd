//! Teamdesk core
//!
//! Shared vocabulary for the conversation synchronization engine: who is
//! talking ([`UserId`], [`LocalUser`]), where ([`ConversationRef`]), what was
//! said ([`Message`]) and what the sidebar shows ([`ConversationSummary`]).
//!
//! # Wire payloads
//!
//! The backing service and the push channel speak JSON. [`RawMessage`] and
//! [`PushEvent`] mirror the transport shape exactly, including the three
//! mutually exclusive conversation fields. Conversion into the validated
//! [`Message`] is the single place where malformed payloads are rejected.
//!
//! # Environment
//!
//! [`env::Environment`] decouples time from the sync logic so the same state
//! machines run against a virtual clock in simulation and `tokio::time` in
//! production.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod conversation;
pub mod env;
mod error;
mod message;
mod summary;
mod user;

pub use conversation::{ConversationKind, ConversationRef};
pub use error::{BackendError, PayloadError};
pub use message::{Attachment, Message, MessageDraft, MessageId, PushEvent, RawMessage};
pub use summary::ConversationSummary;
pub use user::{LocalUser, UserId};
