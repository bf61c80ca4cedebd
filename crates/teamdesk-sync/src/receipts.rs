//! Read-receipt commits.

use std::collections::HashMap;

use teamdesk_core::{BackendError, ConversationRef, UserId};

use crate::{ReceiptOrigin, SyncAction, SyncError, Timeline};

/// Result of asking for a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptCommit {
    /// Commit to execute, if one has to go out.
    pub action: Option<SyncAction>,
    /// Messages whose `read_by` grew from the optimistic local mark.
    pub widened: usize,
}

/// Tells the backing store which conversations the local user has seen.
///
/// Commits are fire-and-forget. A background failure is swallowed and the
/// next poll commits again. The local timeline is marked read optimistically
/// before the commit goes out, and later merges never retract the mark.
///
/// At most one commit per conversation is outstanding. A manual request that
/// arrives while a background commit is out upgrades it, so the outcome of
/// that commit is reported to the user.
#[derive(Debug, Clone, Default)]
pub struct ReadReceiptCommitter {
    in_flight: HashMap<ConversationRef, ReceiptOrigin>,
}

impl ReadReceiptCommitter {
    /// Create a committer with nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit `timeline` as read by `reader`.
    ///
    /// Marks every message not authored by `reader` as read locally. The
    /// returned [`SyncAction::MarkRead`] is `None` when a commit for the
    /// conversation is already in flight, or for a background commit when
    /// there is nothing from anyone else to mark.
    pub fn commit(
        &mut self,
        timeline: &mut Timeline,
        reader: &UserId,
        origin: ReceiptOrigin,
    ) -> ReceiptCommit {
        let conversation = timeline.conversation().clone();
        let widened = timeline.mark_read_locally(reader);
        tracing::trace!(%conversation, widened, "marked read locally");

        if let Some(pending) = self.in_flight.get_mut(&conversation) {
            if origin == ReceiptOrigin::Manual && *pending == ReceiptOrigin::Background {
                tracing::debug!(%conversation, "upgrading in-flight read receipt commit to manual");
                *pending = ReceiptOrigin::Manual;
            } else {
                tracing::debug!(%conversation, ?origin, "read receipt commit already in flight");
            }
            return ReceiptCommit { action: None, widened };
        }
        if origin == ReceiptOrigin::Background && !timeline.has_foreign_messages(reader) {
            return ReceiptCommit { action: None, widened };
        }

        self.in_flight.insert(conversation.clone(), origin);
        ReceiptCommit { action: Some(SyncAction::MarkRead { conversation, origin }), widened }
    }

    /// Record the outcome of a commit.
    ///
    /// Returns the error to surface: only a failed manual commit is reported,
    /// including a background commit upgraded by a manual request.
    pub fn complete(
        &mut self,
        conversation: &ConversationRef,
        origin: ReceiptOrigin,
        result: Result<(), BackendError>,
    ) -> Option<SyncError> {
        let origin = match self.in_flight.remove(conversation) {
            Some(ReceiptOrigin::Manual) => ReceiptOrigin::Manual,
            _ => origin,
        };

        match (result, origin) {
            (Ok(()), _) => None,
            (Err(source), ReceiptOrigin::Background) => {
                tracing::debug!(%conversation, error = %source, "read receipt commit failed, retrying on next poll");
                None
            },
            (Err(source), ReceiptOrigin::Manual) => {
                tracing::warn!(%conversation, error = %source, "manual mark as read failed");
                Some(SyncError::MarkReadFailed { conversation: conversation.clone(), source })
            },
        }
    }

    /// Whether a commit for `conversation` is outstanding.
    pub fn in_flight(&self, conversation: &ConversationRef) -> bool {
        self.in_flight.contains_key(conversation)
    }

    /// Forget outstanding commits (sign-out).
    pub fn reset(&mut self) {
        self.in_flight.clear();
    }
}
