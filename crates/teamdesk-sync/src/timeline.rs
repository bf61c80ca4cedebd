//! Reconciled message timeline.
//!
//! A [`Timeline`] is the single ordered, deduplicated view of one open
//! conversation. Push events and poll snapshots both flow into it and it
//! converges to the same state regardless of arrival order.
//!
//! # Invariants
//!
//! - Each message id appears at most once.
//! - Messages are sorted by `created_at`, ties broken by id.
//! - A message's `read_by` only ever grows.
//! - A held message is never removed because a snapshot omits it. Deletion
//!   is the explicit `deleted` tombstone.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use teamdesk_core::{ConversationRef, Message, MessageId, UserId};

/// Result of folding a snapshot into the timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Messages that were not held before.
    pub appended: usize,
    /// Held messages whose `read_by` grew.
    pub receipts_widened: usize,
    /// Held messages that picked up an edit or a tombstone.
    pub revised: usize,
}

impl MergeOutcome {
    /// Whether the merge changed anything visible.
    pub fn changed(&self) -> bool {
        self.appended + self.receipts_widened + self.revised > 0
    }
}

/// What a reply reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTarget<'a> {
    /// The referenced message is in the timeline.
    Found(&'a Message),
    /// The referenced message is not (or no longer) known. Render a
    /// placeholder.
    Unavailable(&'a MessageId),
}

/// Consecutive messages sharing one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBucket<'a> {
    /// Local calendar date.
    pub date: NaiveDate,
    /// Messages of that day, in timeline order.
    pub messages: &'a [Message],
}

/// Ordered, deduplicated message timeline of one conversation.
#[derive(Debug, Clone)]
pub struct Timeline {
    conversation: ConversationRef,
    /// Sorted by `(created_at, id)`.
    messages: Vec<Message>,
    /// Id to sort timestamp. Together with the id this locates the message
    /// by binary search.
    index: HashMap<MessageId, DateTime<Utc>>,
}

impl Timeline {
    /// Create an empty timeline for `conversation`.
    pub fn new(conversation: ConversationRef) -> Self {
        Self { conversation, messages: Vec::new(), index: HashMap::new() }
    }

    /// Conversation this timeline belongs to.
    pub fn conversation(&self) -> &ConversationRef {
        &self.conversation
    }

    /// Messages in timeline order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages are held.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether a message with `id` is held.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.index.contains_key(id)
    }

    /// Message with `id`, if held.
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.position(id).map(|pos| &self.messages[pos])
    }

    /// Latest message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Consume the timeline, returning its messages in order.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Replace the timeline wholesale.
    ///
    /// Used on conversation switch. Duplicates inside `messages` are folded
    /// together and messages of other conversations are ignored. Returns the
    /// number of messages held afterwards.
    pub fn load_snapshot(&mut self, messages: Vec<Message>) -> usize {
        self.messages.clear();
        self.index.clear();
        self.merge_snapshot(messages);
        self.messages.len()
    }

    /// Insert `message` unless its id is already held.
    ///
    /// Returns `true` if the message was inserted.
    pub fn append_if_new(&mut self, message: Message) -> bool {
        if message.conversation != self.conversation {
            tracing::debug!(
                timeline = %self.conversation,
                message = %message.conversation,
                "ignoring message for another conversation"
            );
            return false;
        }
        if self.index.contains_key(&message.id) {
            return false;
        }
        self.insert_sorted(message);
        true
    }

    /// Fold a poll snapshot into the timeline.
    ///
    /// Unknown messages are inserted in chronological position. Known
    /// messages only gain read receipts, a later edit or a tombstone. Held
    /// messages missing from the snapshot are kept.
    pub fn merge_snapshot(&mut self, messages: Vec<Message>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for message in messages {
            if message.conversation != self.conversation {
                tracing::debug!(
                    timeline = %self.conversation,
                    message = %message.conversation,
                    "ignoring snapshot entry for another conversation"
                );
                continue;
            }

            match self.position(&message.id) {
                Some(pos) => {
                    let absorbed = absorb(&mut self.messages[pos], message);
                    outcome.receipts_widened += usize::from(absorbed.receipts);
                    outcome.revised += usize::from(absorbed.revised);
                },
                None => {
                    self.insert_sorted(message);
                    outcome.appended += 1;
                },
            }
        }

        outcome
    }

    /// Optimistically record that `reader` has seen every message they did
    /// not author.
    ///
    /// Returns the number of messages whose `read_by` grew.
    pub fn mark_read_locally(&mut self, reader: &UserId) -> usize {
        self.messages
            .iter_mut()
            .filter(|message| !message.is_authored_by(reader))
            .map(|message| message.read_by.insert(reader.clone()))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Whether any held message was written by someone other than `user`.
    pub fn has_foreign_messages(&self, user: &UserId) -> bool {
        self.messages.iter().any(|message| !message.is_authored_by(user))
    }

    /// Resolve the reply reference of `message`.
    ///
    /// `None` if the message is not a reply.
    pub fn resolve_reply<'a>(&'a self, message: &'a Message) -> Option<ReplyTarget<'a>> {
        let target = message.reply_to.as_ref()?;
        Some(match self.get(target) {
            Some(found) => ReplyTarget::Found(found),
            None => ReplyTarget::Unavailable(target),
        })
    }

    /// Partition the timeline into local calendar days.
    ///
    /// Two consecutive messages share a bucket iff their `created_at`
    /// falls on the same date in `tz`.
    pub fn day_buckets<Tz: TimeZone>(&self, tz: &Tz) -> Vec<DayBucket<'_>> {
        let mut buckets = Vec::new();
        let mut start = 0;
        let mut current: Option<NaiveDate> = None;

        for (pos, message) in self.messages.iter().enumerate() {
            let date = message.created_at.with_timezone(tz).date_naive();
            match current {
                Some(day) if day == date => {},
                Some(day) => {
                    buckets.push(DayBucket { date: day, messages: &self.messages[start..pos] });
                    start = pos;
                    current = Some(date);
                },
                None => current = Some(date),
            }
        }

        if let Some(day) = current {
            buckets.push(DayBucket { date: day, messages: &self.messages[start..] });
        }
        buckets
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        let created_at = *self.index.get(id)?;
        self.messages.binary_search_by(|held| held.order_key().cmp(&(created_at, id))).ok()
    }

    fn insert_sorted(&mut self, message: Message) {
        let pos = self
            .messages
            .binary_search_by(|held| held.order_key().cmp(&message.order_key()))
            .unwrap_or_else(|pos| pos);
        self.index.insert(message.id.clone(), message.created_at);
        self.messages.insert(pos, message);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Absorbed {
    receipts: bool,
    revised: bool,
}

/// Fold a fresh copy of a held message into the held record.
///
/// Mutates only when the copy carries something new.
fn absorb(held: &mut Message, incoming: Message) -> Absorbed {
    let mut absorbed = Absorbed::default();

    if !incoming.read_by.is_subset(&held.read_by) {
        held.read_by.extend(incoming.read_by);
        absorbed.receipts = true;
    }

    if incoming.deleted && !held.deleted {
        held.deleted = true;
        absorbed.revised = true;
    }

    if incoming.edited_at > held.edited_at {
        held.edited_at = incoming.edited_at;
        held.content = incoming.content;
        held.attachments = incoming.attachments;
        absorbed.revised = true;
    }

    absorbed
}
