//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A timeline never holds the same message id twice.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(ref timeline) = state.timeline else {
            return Ok(());
        };
        let mut seen = HashSet::new();
        for message in &timeline.messages {
            if !seen.insert(&message.id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{}: duplicate id {}", timeline.conversation, message.id),
                });
            }
        }
        Ok(())
    }
}

/// Timeline order is strictly ascending by `(created_at, id)`.
pub struct TimelineOrdered;

impl Invariant for TimelineOrdered {
    fn name(&self) -> &'static str {
        "timeline_ordered"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(ref timeline) = state.timeline else {
            return Ok(());
        };
        for pair in timeline.messages.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if (a.created_at, &a.id) >= (b.created_at, &b.id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{}: {} ({}) shown before {} ({})",
                        timeline.conversation, a.id, a.created_at, b.id, b.created_at
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Every message shown belongs to the open conversation.
pub struct TimelineMatchesConversation;

impl Invariant for TimelineMatchesConversation {
    fn name(&self) -> &'static str {
        "timeline_matches_conversation"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(ref timeline) = state.timeline else {
            return Ok(());
        };
        match timeline.messages.iter().find(|m| m.conversation != timeline.conversation) {
            Some(stray) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{} shown in {} but belongs to {}",
                    stray.id, timeline.conversation, stray.conversation
                ),
            }),
            None => Ok(()),
        }
    }
}

/// A message's set of readers only ever grows.
pub struct ReadReceiptMonotonicity;

impl Invariant for ReadReceiptMonotonicity {
    fn name(&self) -> &'static str {
        "read_receipt_monotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for ((conversation, id), history) in &state.receipt_history {
            for window in history.windows(2) {
                if !window[0].is_subset(&window[1]) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{conversation} {id}: readers shrank {:?} -> {:?}",
                            window[0], window[1]
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Once shown as deleted, a message stays deleted.
pub struct TombstonesSticky;

impl Invariant for TombstonesSticky {
    fn name(&self) -> &'static str {
        "tombstones_sticky"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(ref timeline) = state.timeline else {
            return Ok(());
        };
        let revived = timeline.messages.iter().find(|m| {
            !m.deleted && state.tombstoned.contains(&(m.conversation.clone(), m.id.clone()))
        });
        match revived {
            Some(message) => Err(Violation {
                invariant: self.name(),
                message: format!("{} {}: tombstone reverted", timeline.conversation, message.id),
            }),
            None => Ok(()),
        }
    }
}

/// The open conversation never shows unread messages.
pub struct OpenConversationHasNoUnread;

impl Invariant for OpenConversationHasNoUnread {
    fn name(&self) -> &'static str {
        "open_conversation_has_no_unread"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let (Some(open), Some(sidebar)) = (state.open_conversation(), state.sidebar.as_ref())
        else {
            return Ok(());
        };
        match sidebar.get(open) {
            Some(&unread) if unread > 0 => Err(Violation {
                invariant: self.name(),
                message: format!("{open} is open but shows {unread} unread"),
            }),
            _ => Ok(()),
        }
    }
}
