//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the engine at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks. A snapshot that is updated repeatedly (through
//! the `observe_*` methods) also accumulates the history that monotonicity
//! checks need.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use teamdesk_core::{ConversationRef, ConversationSummary, Message, MessageId, UserId};
use teamdesk_sync::{Environment, SyncEngine, Timeline};

/// Snapshot of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSnapshot {
    /// Message id.
    pub id: MessageId,
    /// Conversation the message claims to belong to.
    pub conversation: ConversationRef,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Tombstone flag.
    pub deleted: bool,
    /// Users who have seen it.
    pub read_by: BTreeSet<UserId>,
}

impl From<&Message> for MessageSnapshot {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            conversation: message.conversation.clone(),
            created_at: message.created_at,
            deleted: message.deleted,
            read_by: message.read_by.clone(),
        }
    }
}

/// Snapshot of the open conversation's timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineSnapshot {
    /// Conversation the timeline shows.
    pub conversation: ConversationRef,
    /// Messages in display order.
    pub messages: Vec<MessageSnapshot>,
}

impl From<&Timeline> for TimelineSnapshot {
    fn from(timeline: &Timeline) -> Self {
        Self {
            conversation: timeline.conversation().clone(),
            messages: timeline.messages().iter().map(MessageSnapshot::from).collect(),
        }
    }
}

/// Snapshot of the observable system state plus accumulated history.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Open conversation's timeline. `None` for the empty state.
    pub timeline: Option<TimelineSnapshot>,
    /// Unread count per sidebar entry. `None` while the sidebar has not been
    /// rendered for the current open conversation.
    pub sidebar: Option<BTreeMap<ConversationRef, u32>>,
    /// Every receipt set observed per message since the open conversation
    /// was last switched, oldest first.
    pub receipt_history: HashMap<(ConversationRef, MessageId), Vec<BTreeSet<UserId>>>,
    /// Messages ever observed as tombstoned.
    pub tombstoned: HashSet<(ConversationRef, MessageId)>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (nothing open, no sidebar).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current state of `engine`, without history.
    pub fn from_engine<E: Environment>(engine: &SyncEngine<E>) -> Self {
        let mut snapshot = Self::empty();
        snapshot.observe_engine(engine);
        snapshot
    }

    /// Conversation shown in the timeline, if any.
    pub fn open_conversation(&self) -> Option<&ConversationRef> {
        self.timeline.as_ref().map(|timeline| &timeline.conversation)
    }

    /// Record the engine's current state, keeping history.
    pub fn observe_engine<E: Environment>(&mut self, engine: &SyncEngine<E>) {
        self.observe_timeline(engine.timeline());
        self.observe_sidebar(engine.accountant().summaries());
    }

    /// Record a timeline render.
    ///
    /// Switching conversations invalidates the sidebar view until the next
    /// sidebar render and restarts receipt history.
    pub fn observe_timeline(&mut self, timeline: Option<&Timeline>) {
        let next = timeline.map(TimelineSnapshot::from);
        let switched = next.as_ref().map(|t| &t.conversation) != self.open_conversation();
        if switched {
            // A reopened conversation is rebuilt from the service, which may
            // never have recorded an optimistic local receipt.
            self.sidebar = None;
            self.receipt_history.clear();
        }

        if let Some(ref snapshot) = next {
            for message in &snapshot.messages {
                let key = (message.conversation.clone(), message.id.clone());
                if message.deleted {
                    self.tombstoned.insert(key.clone());
                }
                let history = self.receipt_history.entry(key).or_default();
                if history.last() != Some(&message.read_by) {
                    history.push(message.read_by.clone());
                }
            }
        }
        self.timeline = next;
    }

    /// Record a sidebar render.
    pub fn observe_sidebar<'a>(&mut self, summaries: impl IntoIterator<Item = &'a ConversationSummary>) {
        self.sidebar = Some(
            summaries
                .into_iter()
                .map(|summary| (summary.conversation.clone(), summary.unread_count))
                .collect(),
        );
    }
}
