//! Sync events and actions.

use teamdesk_core::{
    BackendError, ConversationRef, ConversationSummary, MessageDraft, PushEvent, RawMessage,
};

use crate::{Generation, SyncError};

/// Why messages are being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// The user switched to the conversation. Failure is reported.
    Switch,
    /// Foreground poll tick. Failure is skipped silently.
    Poll,
}

/// Who asked for a read-receipt commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOrigin {
    /// Automatic commit after a load or poll. Failure is swallowed.
    Background,
    /// Explicit "mark as read" from the user. Failure is reported.
    Manual,
}

/// Audible cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// A message authored by the local user landed.
    Sent,
    /// A message from someone else arrived.
    Received,
    /// A message from someone else mentions the local user.
    Mention,
    /// A user action failed.
    Error,
}

/// System notification for a conversation that is not open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Conversation the notification is about.
    pub conversation: ConversationRef,
    /// Headline, derived from sender and conversation name.
    pub title: String,
    /// Message text or a generic fallback.
    pub body: String,
    /// Link routing back to the conversation.
    pub deep_link: String,
}

/// Events the caller feeds into the engine.
///
/// The caller is responsible for:
/// - Executing fetch/commit/send actions and feeding back their results
/// - Firing poll ticks with the generation they were scheduled with
/// - Forwarding push frames and user intents
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The user session is established. Starts the background poll.
    SessionStarted,

    /// The user signed out. Stops everything and forgets all state.
    SignedOut,

    /// The user selected a conversation.
    OpenConversation(ConversationRef),

    /// The user closed the open conversation.
    CloseConversation,

    /// Foreground poll timer fired.
    ForegroundTick {
        /// Generation the timer was scheduled with.
        generation: Generation,
    },

    /// Background poll timer fired.
    BackgroundTick {
        /// Generation the timer was scheduled with.
        generation: Generation,
    },

    /// A message fetch completed.
    MessagesFetched {
        /// Conversation that was fetched.
        conversation: ConversationRef,
        /// Generation the fetch was issued under.
        generation: Generation,
        /// Why the fetch happened.
        origin: FetchOrigin,
        /// Snapshot or failure.
        result: Result<Vec<RawMessage>, BackendError>,
    },

    /// A summary fetch (all kinds) completed.
    SummariesFetched {
        /// Generation the fetch was issued under.
        generation: Generation,
        /// Summaries of every conversation, or failure.
        result: Result<Vec<ConversationSummary>, BackendError>,
    },

    /// Raw push frame, not yet decoded.
    PushFrame(Vec<u8>),

    /// Decoded push event.
    PushReceived(PushEvent),

    /// The user explicitly marked the open conversation as read.
    MarkReadRequested,

    /// A read-receipt commit completed.
    MarkReadCompleted {
        /// Conversation that was marked.
        conversation: ConversationRef,
        /// Who asked for the commit.
        origin: ReceiptOrigin,
        /// Outcome.
        result: Result<(), BackendError>,
    },

    /// The user wants to send a message to the open conversation.
    SendRequested(MessageDraft),

    /// A send completed.
    SendCompleted {
        /// Conversation the message was sent to.
        conversation: ConversationRef,
        /// Draft that was sent, handed back on failure.
        draft: MessageDraft,
        /// Authoritative persisted message, or failure.
        result: Result<RawMessage, BackendError>,
    },
}

/// Actions the engine produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Fetch the full message list of a conversation.
    ///
    /// Feed the result back as [`SyncEvent::MessagesFetched`].
    FetchMessages {
        /// Conversation to fetch.
        conversation: ConversationRef,
        /// Generation to echo back.
        generation: Generation,
        /// Why the fetch happens.
        origin: FetchOrigin,
    },

    /// Fetch summaries of every channel, group and DM.
    ///
    /// Feed the result back as [`SyncEvent::SummariesFetched`].
    FetchSummaries {
        /// Generation to echo back.
        generation: Generation,
    },

    /// Tell the backing store the local user has seen the conversation.
    ///
    /// Feed the result back as [`SyncEvent::MarkReadCompleted`].
    MarkRead {
        /// Conversation to mark.
        conversation: ConversationRef,
        /// Who asked.
        origin: ReceiptOrigin,
    },

    /// Send a message.
    ///
    /// Feed the result back as [`SyncEvent::SendCompleted`].
    SendMessage {
        /// Target conversation.
        conversation: ConversationRef,
        /// Draft to send.
        draft: MessageDraft,
    },

    /// (Re)start the foreground poll timer, replacing any running one.
    ScheduleForegroundPoll {
        /// Generation every tick must carry.
        generation: Generation,
    },

    /// Stop the foreground poll timer.
    CancelForegroundPoll,

    /// (Re)start the background poll timer, replacing any running one.
    ScheduleBackgroundPoll {
        /// Generation every tick must carry.
        generation: Generation,
    },

    /// Stop the background poll timer.
    CancelBackgroundPoll,

    /// The open conversation's timeline changed.
    TimelineUpdated {
        /// Conversation whose timeline changed.
        conversation: ConversationRef,
    },

    /// No conversation is open any more.
    TimelineClosed,

    /// Sidebar summaries or unread counts changed.
    SummariesUpdated,

    /// Show a system notification.
    Notify(Notification),

    /// Play an audible cue.
    PlayCue(Cue),

    /// Show an error to the user.
    ReportError(SyncError),

    /// Put an unsent draft back into the composer.
    RestoreDraft {
        /// Conversation the draft belongs to.
        conversation: ConversationRef,
        /// Draft to restore.
        draft: MessageDraft,
    },
}
