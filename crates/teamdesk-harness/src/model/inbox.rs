//! Reference model of a push-fed client.
//!
//! The model is deliberately naive: plain maps, no generations, no indexes.
//! It is the oracle the real engine is compared against.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    time::Duration,
};

use chrono::{DateTime, Utc};
use teamdesk_core::{ConversationRef, MessageId};
use teamdesk_sync::{Cue, DEFAULT_NOTIFICATION_TTL};

use super::operation::Author;

/// A message as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    /// Message id.
    pub id: MessageId,
    /// Conversation it belongs to.
    pub conversation: ConversationRef,
    /// Who wrote it.
    pub author: Author,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Observable effect of one push delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushEffect {
    /// Whether a notification was raised.
    pub notified: bool,
    /// Cue played, if any.
    pub cue: Option<Cue>,
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableInbox {
    /// Open conversation.
    pub open: Option<ConversationRef>,
    /// Ids in the open timeline, in display order.
    pub timeline: Vec<MessageId>,
    /// Non-zero unread counts.
    pub unread: BTreeMap<ConversationRef, u32>,
}

/// Model inbox: the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelInbox {
    open: Option<ConversationRef>,
    timeline: BTreeSet<(DateTime<Utc>, MessageId)>,
    unread: BTreeMap<ConversationRef, u32>,
    notified: HashMap<MessageId, Duration>,
    now: Duration,
}

impl Default for ModelInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelInbox {
    /// Signed-in client with nothing open and nothing unread.
    pub fn new() -> Self {
        Self {
            open: None,
            timeline: BTreeSet::new(),
            unread: BTreeMap::new(),
            notified: HashMap::new(),
            now: Duration::ZERO,
        }
    }

    /// Select `conversation`. Re-selecting the open one changes nothing.
    pub fn open(&mut self, conversation: ConversationRef) {
        if self.open.as_ref() == Some(&conversation) {
            return;
        }
        self.unread.remove(&conversation);
        self.timeline.clear();
        self.open = Some(conversation);
    }

    /// Close the open conversation.
    pub fn close(&mut self) {
        self.open = None;
        self.timeline.clear();
    }

    /// Let `by` pass.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Deliver `message` over the push channel.
    pub fn push(&mut self, message: &ModelMessage) -> PushEffect {
        let cue = match message.author {
            Author::Local => Cue::Sent,
            Author::Foreign => Cue::Received,
            Author::ForeignMention => Cue::Mention,
        };

        if self.open.as_ref() == Some(&message.conversation) {
            let inserted = self.timeline.insert((message.created_at, message.id.clone()));
            return PushEffect { notified: false, cue: inserted.then_some(cue) };
        }
        if message.author == Author::Local {
            return PushEffect { notified: false, cue: Some(cue) };
        }

        let recent = self
            .notified
            .get(&message.id)
            .is_some_and(|at| self.now.saturating_sub(*at) < DEFAULT_NOTIFICATION_TTL);
        if recent {
            return PushEffect::default();
        }

        self.notified.insert(message.id.clone(), self.now);
        *self.unread.entry(message.conversation.clone()).or_default() += 1;
        PushEffect { notified: true, cue: Some(cue) }
    }

    /// Observable state.
    pub fn observe(&self) -> ObservableInbox {
        ObservableInbox {
            open: self.open.clone(),
            timeline: self.timeline.iter().map(|(_, id)| id.clone()).collect(),
            unread: self.unread.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn message(id: &str, conversation: ConversationRef, author: Author) -> ModelMessage {
        ModelMessage {
            id: MessageId::from(id),
            conversation,
            author,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default(),
        }
    }

    #[test]
    fn redelivery_counts_again_only_after_ttl() {
        let mut inbox = ModelInbox::new();
        let m1 = message("m1", ConversationRef::dm("d1"), Author::Foreign);

        assert!(inbox.push(&m1).notified);
        assert!(!inbox.push(&m1).notified);
        inbox.advance(DEFAULT_NOTIFICATION_TTL);
        assert!(inbox.push(&m1).notified);

        assert_eq!(inbox.observe().unread.get(&ConversationRef::dm("d1")), Some(&2));
    }

    #[test]
    fn opening_clears_unread() {
        let mut inbox = ModelInbox::new();
        let dm = ConversationRef::dm("d1");
        inbox.push(&message("m1", dm.clone(), Author::Foreign));

        inbox.open(dm.clone());
        let effect = inbox.push(&message("m2", dm, Author::Foreign));

        assert_eq!(effect, PushEffect { notified: false, cue: Some(Cue::Received) });
        assert!(inbox.observe().unread.is_empty());
        assert_eq!(inbox.observe().timeline, [MessageId::from("m2")]);
    }
}
