//! User-facing sync errors.
//!
//! Only failures of user-initiated actions become a [`SyncError`]. Background
//! failures (poll fetches, read-receipt commits, malformed push frames) are
//! logged and retried on the next tick instead.

use teamdesk_core::{BackendError, ConversationRef};
use thiserror::Error;

/// Failure surfaced to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The action needs an open conversation and none is open.
    #[error("no conversation is open")]
    NoOpenConversation,

    /// The draft has no text and no reply target.
    #[error("cannot send an empty message")]
    EmptyDraft,

    /// Loading a conversation the user switched to failed.
    #[error("could not load {conversation}: {source}")]
    SwitchFailed {
        /// Conversation being opened
        conversation: ConversationRef,
        /// Backend failure
        source: BackendError,
    },

    /// Sending a message failed. The draft is handed back for retry.
    #[error("message not sent: {source}")]
    SendFailed {
        /// Backend failure
        source: BackendError,
    },

    /// A manual "mark as read" failed.
    #[error("could not mark {conversation} as read: {source}")]
    MarkReadFailed {
        /// Conversation being marked
        conversation: ConversationRef,
        /// Backend failure
        source: BackendError,
    },
}
