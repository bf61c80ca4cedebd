//! Short-lived record of raised notifications.
//!
//! Push notifications and the background delta pass can describe the same
//! message. The ledger remembers, for a bounded time, which (conversation,
//! message) pairs already produced a notification so the delta pass can stay
//! quiet about them.

use std::{collections::HashMap, time::Duration};

use teamdesk_core::{ConversationRef, MessageId};

/// Notification de-duplication ledger.
///
/// Generic over the environment's instant type so tests run on virtual time.
#[derive(Debug, Clone)]
pub struct NotificationLedger<I> {
    ttl: Duration,
    entries: HashMap<(ConversationRef, MessageId), I>,
}

impl<I> NotificationLedger<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Create an empty ledger whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    /// Remember that `message` in `conversation` was notified at `now`.
    pub fn record(&mut self, conversation: ConversationRef, message: MessageId, now: I) {
        self.prune(now);
        self.entries.insert((conversation, message), now);
    }

    /// Whether `message` in `conversation` was notified within the TTL.
    pub fn contains(&self, conversation: &ConversationRef, message: &MessageId, now: I) -> bool {
        self.entries
            .get(&(conversation.clone(), message.clone()))
            .is_some_and(|recorded| !self.expired(*recorded, now))
    }

    /// Drop expired entries.
    pub fn prune(&mut self, now: I) {
        let ttl = self.ttl;
        self.entries.retain(|_, recorded| now < *recorded || now - *recorded < ttl);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of live entries (expired ones may linger until the next prune).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expired(&self, recorded: I, now: I) -> bool {
        now >= recorded && now - recorded >= self.ttl
    }
}
