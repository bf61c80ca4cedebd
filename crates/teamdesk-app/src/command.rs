//! User commands accepted by the runtime.

use teamdesk_core::{ConversationRef, MessageDraft};

/// Intent from the user, delivered over the runtime's command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Select a conversation.
    Open(ConversationRef),
    /// Close the open conversation.
    Close,
    /// Send a message to the open conversation.
    Send(MessageDraft),
    /// Mark the open conversation as read.
    MarkRead,
    /// A notification was clicked. Carries its deep link.
    ActivateNotification(String),
    /// Re-establish the session after a sign-out.
    SignIn,
    /// End the session and forget all synchronized state.
    SignOut,
    /// Stop the runtime.
    Quit,
}
