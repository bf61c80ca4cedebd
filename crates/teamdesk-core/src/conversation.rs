//! Conversation references.
//!
//! A conversation is exactly one of a channel, a group or a direct message.
//! The transport encodes this as three optional fields of which exactly one
//! must be set; [`ConversationRef::from_fields`] is where that rule is
//! enforced.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::PayloadError;

/// Kind of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// Named, workspace-wide channel.
    Channel,
    /// Private group of several members.
    Group,
    /// Direct message between two users.
    Dm,
}

impl ConversationKind {
    /// Every kind, in sidebar order.
    pub const ALL: [Self; 3] = [Self::Channel, Self::Group, Self::Dm];

    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Group => "group",
            Self::Dm => "dm",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationKind {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channel" => Ok(Self::Channel),
            "group" => Ok(Self::Group),
            "dm" => Ok(Self::Dm),
            other => Err(PayloadError::InvalidDeepLink(format!("unknown kind {other:?}"))),
        }
    }
}

/// Tagged identifier selecting exactly one channel, group or direct message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationRef {
    /// Which namespace `id` lives in.
    pub kind: ConversationKind,
    /// Server-assigned id within that namespace.
    pub id: String,
}

impl ConversationRef {
    /// Create a reference of the given kind.
    pub fn new(kind: ConversationKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    /// Channel reference.
    pub fn channel(id: impl Into<String>) -> Self {
        Self::new(ConversationKind::Channel, id)
    }

    /// Group reference.
    pub fn group(id: impl Into<String>) -> Self {
        Self::new(ConversationKind::Group, id)
    }

    /// Direct message reference.
    pub fn dm(id: impl Into<String>) -> Self {
        Self::new(ConversationKind::Dm, id)
    }

    /// Build a reference from the transport's three optional fields.
    ///
    /// Empty strings count as absent. Exactly one field must remain.
    pub fn from_fields(
        channel_id: Option<&str>,
        group_id: Option<&str>,
        dm_id: Option<&str>,
    ) -> Result<Self, PayloadError> {
        let populated: Vec<Self> = [
            (ConversationKind::Channel, channel_id),
            (ConversationKind::Group, group_id),
            (ConversationKind::Dm, dm_id),
        ]
        .into_iter()
        .filter_map(|(kind, id)| id.filter(|id| !id.is_empty()).map(|id| Self::new(kind, id)))
        .collect();

        match populated.len() {
            0 => Err(PayloadError::NoConversation),
            1 => populated.into_iter().next().ok_or(PayloadError::NoConversation),
            count => Err(PayloadError::AmbiguousConversation { count }),
        }
    }

    /// Deep link routing a notification back to this conversation.
    ///
    /// Format: `type={channel|group|dm}&id={conversationId}`, with the id
    /// percent-encoded.
    pub fn deep_link(&self) -> String {
        format!("type={}&id={}", self.kind, urlencoding::encode(&self.id))
    }

    /// Parse a deep link produced by [`ConversationRef::deep_link`].
    pub fn from_deep_link(link: &str) -> Result<Self, PayloadError> {
        let mut kind = None;
        let mut id = None;

        for pair in link.split('&') {
            match pair.split_once('=') {
                Some(("type", value)) => kind = Some(value.parse::<ConversationKind>()?),
                Some(("id", value)) if !value.is_empty() => {
                    let decoded = urlencoding::decode(value)
                        .map_err(|_| PayloadError::InvalidDeepLink(link.to_string()))?;
                    id = Some(decoded.into_owned());
                },
                _ => return Err(PayloadError::InvalidDeepLink(link.to_string())),
            }
        }

        match (kind, id) {
            (Some(kind), Some(id)) => Ok(Self::new(kind, id)),
            _ => Err(PayloadError::InvalidDeepLink(link.to_string())),
        }
    }
}

impl fmt::Display for ConversationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
