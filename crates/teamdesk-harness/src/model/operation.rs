//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to a signed-in client
//! whose only data source is the push channel. They are generated randomly by
//! proptest and applied to both the model and the real engine.

use teamdesk_core::ConversationRef;

/// Conversation index (kept small so operations collide often).
pub type ModelConversation = u8;

/// Number of conversations the model knows about.
pub const MODEL_CONVERSATIONS: ModelConversation = 3;

/// Map a model conversation to a real one: a channel, a group and a DM.
pub fn conversation_ref(conversation: ModelConversation) -> ConversationRef {
    match conversation % MODEL_CONVERSATIONS {
        0 => ConversationRef::channel("general"),
        1 => ConversationRef::group("ops"),
        _ => ConversationRef::dm("ada-grace"),
    }
}

/// Who wrote a pushed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    /// The local user, e.g. from another device.
    Local,
    /// Someone else.
    Foreign,
    /// Someone else, mentioning the local user.
    ForeignMention,
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// The user selects a conversation.
    Open {
        /// Target conversation.
        conversation: ModelConversation,
    },

    /// The user closes the open conversation.
    Close,

    /// A new message arrives on the push channel.
    Push {
        /// Conversation the message belongs to.
        conversation: ModelConversation,
        /// Who wrote it.
        author: Author,
    },

    /// The most recent push is delivered again.
    Redeliver,

    /// Virtual time passes.
    AdvanceTime {
        /// Seconds to advance.
        secs: u16,
    },
}
