//! In-memory authoritative message store.
//!
//! Plays the backing service's data model: it assigns ids and timestamps,
//! tracks how far the local user has read each conversation and derives the
//! sidebar summaries from that. Both [`crate::SimBackend`] (async) and
//! [`crate::SimWorld`] (synchronous) serve from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use teamdesk_core::{
    ConversationKind, ConversationRef, ConversationSummary, Message, MessageDraft, MessageId,
    RawMessage, UserId,
};

/// Timestamp of the first stored message: 2024-01-01T09:00:00Z.
const FIRST_MESSAGE_SECS: i64 = 1_704_099_600;

#[derive(Debug, Clone)]
struct StoredConversation {
    display_name: String,
    /// Kept in timeline order.
    messages: Vec<Message>,
    /// Number of messages present when the local user last marked it read.
    read_mark: usize,
}

/// Authoritative message store of the simulated service.
#[derive(Debug, Clone)]
pub struct ServerStore {
    local_user: UserId,
    local_name: String,
    conversations: BTreeMap<ConversationRef, StoredConversation>,
    next_seq: u64,
}

impl ServerStore {
    /// Empty store serving `local_user`.
    pub fn new(local_user: UserId, local_name: impl Into<String>) -> Self {
        Self {
            local_user,
            local_name: local_name.into(),
            conversations: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Register a conversation with its sidebar name.
    pub fn add_conversation(&mut self, conversation: ConversationRef, display_name: &str) {
        self.conversations.entry(conversation).or_insert_with(|| StoredConversation {
            display_name: display_name.to_string(),
            messages: Vec::new(),
            read_mark: 0,
        });
    }

    /// Persist a message from `sender`, timestamped after every earlier one.
    pub fn post(
        &mut self,
        conversation: &ConversationRef,
        sender: &UserId,
        sender_name: &str,
        content: &str,
    ) -> RawMessage {
        let created_at = self.timestamp(self.next_seq);
        self.post_at(conversation, sender, sender_name, content, created_at)
    }

    /// Persist a message with an explicit timestamp.
    pub fn post_at(
        &mut self,
        conversation: &ConversationRef,
        sender: &UserId,
        sender_name: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> RawMessage {
        let message = Message {
            id: self.next_id(),
            conversation: conversation.clone(),
            sender_id: sender.clone(),
            sender_name: sender_name.to_string(),
            content: Some(content.to_string()),
            attachments: Vec::new(),
            created_at,
            edited_at: None,
            deleted: false,
            reply_to: None,
            read_by: Default::default(),
        };
        self.insert(message)
    }

    /// Persist a draft sent by the local user.
    pub fn send(&mut self, conversation: &ConversationRef, draft: &MessageDraft) -> RawMessage {
        let created_at = self.timestamp(self.next_seq);
        let message = Message {
            id: self.next_id(),
            conversation: conversation.clone(),
            sender_id: self.local_user.clone(),
            sender_name: self.local_name.clone(),
            content: Some(draft.content.clone()),
            attachments: Vec::new(),
            created_at,
            edited_at: None,
            deleted: false,
            reply_to: draft.reply_to.clone(),
            read_by: Default::default(),
        };
        self.insert(message)
    }

    /// Replace the text of a stored message. Returns `false` if unknown.
    pub fn edit(&mut self, conversation: &ConversationRef, id: &MessageId, content: &str) -> bool {
        let edited_at = self.timestamp(self.next_seq);
        self.next_seq += 1;
        self.with_message(conversation, id, |message| {
            message.content = Some(content.to_string());
            message.edited_at = Some(edited_at);
        })
    }

    /// Tombstone a stored message. Returns `false` if unknown.
    pub fn delete(&mut self, conversation: &ConversationRef, id: &MessageId) -> bool {
        self.with_message(conversation, id, |message| message.deleted = true)
    }

    /// Record that `reader` has seen every message of `conversation`.
    pub fn add_reader(&mut self, conversation: &ConversationRef, reader: &UserId) {
        if let Some(stored) = self.conversations.get_mut(conversation) {
            for message in stored.messages.iter_mut().filter(|m| !m.is_authored_by(reader)) {
                message.read_by.insert(reader.clone());
            }
        }
    }

    /// The local user has seen `conversation`.
    pub fn mark_read(&mut self, conversation: &ConversationRef) {
        let local_user = self.local_user.clone();
        self.add_reader(conversation, &local_user);
        if let Some(stored) = self.conversations.get_mut(conversation) {
            stored.read_mark = stored.messages.len();
        }
    }

    /// Every message of `conversation`, as the service returns it.
    pub fn messages(&self, conversation: &ConversationRef) -> Vec<RawMessage> {
        self.conversations
            .get(conversation)
            .map(|stored| stored.messages.iter().cloned().map(RawMessage::from).collect())
            .unwrap_or_default()
    }

    /// Ids of `conversation`'s messages in timeline order.
    pub fn message_ids(&self, conversation: &ConversationRef) -> Vec<MessageId> {
        self.conversations
            .get(conversation)
            .map(|stored| stored.messages.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Sidebar summaries of every conversation of `kind`.
    pub fn summaries(&self, kind: ConversationKind) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .filter(|(conversation, _)| conversation.kind == kind)
            .map(|(conversation, stored)| self.summarize(conversation, stored))
            .collect()
    }

    /// Sidebar summaries of every conversation.
    pub fn all_summaries(&self) -> Vec<ConversationSummary> {
        ConversationKind::ALL.into_iter().flat_map(|kind| self.summaries(kind)).collect()
    }

    /// Unread count the service reports for `conversation`.
    pub fn unread_count(&self, conversation: &ConversationRef) -> u32 {
        self.conversations
            .get(conversation)
            .map_or(0, |stored| self.summarize(conversation, stored).unread_count)
    }

    /// Registered conversations.
    pub fn conversations(&self) -> impl Iterator<Item = &ConversationRef> {
        self.conversations.keys()
    }

    fn summarize(
        &self,
        conversation: &ConversationRef,
        stored: &StoredConversation,
    ) -> ConversationSummary {
        let unread = stored
            .messages
            .iter()
            .skip(stored.read_mark)
            .filter(|message| !message.is_authored_by(&self.local_user))
            .count();
        let last = stored.messages.last();

        ConversationSummary {
            conversation: conversation.clone(),
            display_name: stored.display_name.clone(),
            last_message_preview: last.and_then(|message| message.content.clone()),
            unread_count: u32::try_from(unread).unwrap_or(u32::MAX),
            last_seen: last.map(|message| message.id.clone()),
        }
    }

    fn insert(&mut self, message: Message) -> RawMessage {
        let conversation = message.conversation.clone();
        self.add_conversation(conversation.clone(), &conversation.id);
        let raw = RawMessage::from(message.clone());

        if let Some(stored) = self.conversations.get_mut(&conversation) {
            let pos = stored
                .messages
                .binary_search_by(|held| held.order_key().cmp(&message.order_key()))
                .unwrap_or_else(|pos| pos);
            stored.messages.insert(pos, message);
        }
        raw
    }

    fn with_message(
        &mut self,
        conversation: &ConversationRef,
        id: &MessageId,
        apply: impl FnOnce(&mut Message),
    ) -> bool {
        let found = self
            .conversations
            .get_mut(conversation)
            .and_then(|stored| stored.messages.iter_mut().find(|m| &m.id == id));
        match found {
            Some(message) => {
                apply(message);
                true
            },
            None => false,
        }
    }

    fn next_id(&mut self) -> MessageId {
        self.next_seq += 1;
        MessageId::new(format!("msg-{:06}", self.next_seq))
    }

    fn timestamp(&self, seq: u64) -> DateTime<Utc> {
        let first = Utc.timestamp_opt(FIRST_MESSAGE_SECS, 0).single().unwrap_or_default();
        first + Duration::seconds(i64::try_from(seq).unwrap_or(i64::MAX / 2))
    }
}
