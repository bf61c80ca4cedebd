//! Sidebar conversation summaries.

use serde::{Deserialize, Serialize};

use crate::{ConversationRef, MessageId};

/// One sidebar entry as reported by the backing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation this entry describes.
    pub conversation: ConversationRef,
    /// Channel/group name, or the other participant for a DM.
    pub display_name: String,
    /// Short preview of the latest message.
    #[serde(default)]
    pub last_message_preview: Option<String>,
    /// Messages the local user has not seen yet.
    #[serde(default)]
    pub unread_count: u32,
    /// Id of the latest message the service knows about.
    #[serde(default)]
    pub last_seen: Option<MessageId>,
}

impl ConversationSummary {
    /// Summary with no unread messages and no preview.
    pub fn new(conversation: ConversationRef, display_name: impl Into<String>) -> Self {
        Self {
            conversation,
            display_name: display_name.into(),
            last_message_preview: None,
            unread_count: 0,
            last_seen: None,
        }
    }

    /// Set the unread count.
    #[must_use]
    pub fn with_unread(mut self, unread_count: u32) -> Self {
        self.unread_count = unread_count;
        self
    }

    /// Set the last-seen marker.
    #[must_use]
    pub fn with_last_seen(mut self, last_seen: MessageId) -> Self {
        self.last_seen = Some(last_seen);
        self
    }
}
