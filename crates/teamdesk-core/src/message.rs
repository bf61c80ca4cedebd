//! Messages and their wire payloads.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversationKind, ConversationRef, PayloadError, UserId};

/// Stable, server-assigned message identifier, unique within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// File attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name shown to the user.
    pub name: String,
    /// Download location.
    pub url: String,
    /// MIME type, if the server knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// A validated chat message.
///
/// Immutable once created, apart from the edit/tombstone fields and the
/// read-receipt set, which only ever grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned id.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation: ConversationRef,
    /// Author.
    pub sender_id: UserId,
    /// Author's display name at send time.
    pub sender_name: String,
    /// Text body. `None` for attachment-only messages.
    pub content: Option<String>,
    /// Attached files.
    pub attachments: Vec<Attachment>,
    /// Server timestamp.
    pub created_at: DateTime<Utc>,
    /// Time of the latest edit, if any.
    pub edited_at: Option<DateTime<Utc>>,
    /// Tombstone flag. Deletion is never expressed by absence.
    pub deleted: bool,
    /// Weak reference to another message in the same conversation.
    pub reply_to: Option<MessageId>,
    /// Users who have seen the message.
    pub read_by: BTreeSet<UserId>,
}

impl Message {
    /// Whether `user` wrote this message.
    pub fn is_authored_by(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }

    /// Whether the text body mentions `display_name` as `@display_name`.
    ///
    /// Case-insensitive. An empty display name never matches.
    pub fn mentions(&self, display_name: &str) -> bool {
        if display_name.is_empty() {
            return false;
        }
        let needle = format!("@{}", display_name.to_lowercase());
        self.content.as_deref().is_some_and(|content| content.to_lowercase().contains(&needle))
    }

    /// Timeline sort key: creation time, then id for stability.
    pub fn order_key(&self) -> (DateTime<Utc>, &MessageId) {
        (self.created_at, &self.id)
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = PayloadError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let id = raw.id.filter(|id| !id.is_empty()).ok_or(PayloadError::MissingId)?;
        let conversation = ConversationRef::from_fields(
            raw.channel_id.as_deref(),
            raw.group_id.as_deref(),
            raw.dm_id.as_deref(),
        )?;

        Ok(Self {
            id: MessageId::new(id),
            conversation,
            sender_id: UserId::new(raw.sender_id),
            sender_name: raw.sender_name,
            content: raw.content,
            attachments: raw.attachments,
            created_at: raw.created_at,
            edited_at: raw.edited_at,
            deleted: raw.deleted,
            reply_to: raw.reply_to.filter(|id| !id.is_empty()).map(MessageId::new),
            read_by: raw.read_by.into_iter().map(UserId::new).collect(),
        })
    }
}

/// Message exactly as the transport delivers it.
///
/// Every field that can be missing on the wire is optional here; validation
/// happens in `Message::try_from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Server-assigned id.
    #[serde(default)]
    pub id: Option<String>,
    /// Set when the message belongs to a channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Set when the message belongs to a group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Set when the message belongs to a direct message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm_id: Option<String>,
    /// Author id.
    #[serde(default)]
    pub sender_id: String,
    /// Author display name.
    #[serde(default)]
    pub sender_name: String,
    /// Text body.
    #[serde(default)]
    pub content: Option<String>,
    /// Attached files.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Server timestamp (RFC 3339).
    pub created_at: DateTime<Utc>,
    /// Time of the latest edit.
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
    /// Id of the message this one replies to.
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Ids of users who have seen the message.
    #[serde(default)]
    pub read_by: Vec<String>,
}

impl From<Message> for RawMessage {
    fn from(message: Message) -> Self {
        let id = Some(message.conversation.id);
        let (channel_id, group_id, dm_id) = match message.conversation.kind {
            ConversationKind::Channel => (id, None, None),
            ConversationKind::Group => (None, id, None),
            ConversationKind::Dm => (None, None, id),
        };

        Self {
            id: Some(message.id.0),
            channel_id,
            group_id,
            dm_id,
            sender_id: message.sender_id.as_str().to_string(),
            sender_name: message.sender_name,
            content: message.content,
            attachments: message.attachments,
            created_at: message.created_at,
            edited_at: message.edited_at,
            deleted: message.deleted,
            reply_to: message.reply_to.map(|id| id.0),
            read_by: message.read_by.iter().map(|user| user.as_str().to_string()).collect(),
        }
    }
}

/// Live event delivered over the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Full message payload.
    pub message: RawMessage,
}

impl PushEvent {
    /// Decode a push frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode as a push frame.
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Message composed locally and not yet accepted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageDraft {
    /// Text typed by the user.
    pub content: String,
    /// Message being replied to.
    pub reply_to: Option<MessageId>,
}

impl MessageDraft {
    /// Draft with text only.
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), reply_to: None }
    }

    /// Reply to `target`.
    #[must_use]
    pub fn replying_to(mut self, target: MessageId) -> Self {
        self.reply_to = Some(target);
        self
    }

    /// Whether the draft has no visible text.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}
