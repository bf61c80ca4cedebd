//! Backend trait for abstracting the backing service.
//!
//! The [`Backend`] trait is the only way the runtime reaches the network. The
//! production implementation talks to the real service; simulation plugs in
//! an in-memory store with controllable latency and failures.

use std::future::Future;

use teamdesk_core::{
    BackendError, ConversationKind, ConversationRef, ConversationSummary, MessageDraft, RawMessage,
};

/// Calls into the backing service.
///
/// Implementations are cheap to clone: the runtime clones the backend into
/// every outstanding call so calls can run concurrently with the event loop.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Fetch the full, authoritative message list of `conversation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or refuses.
    fn fetch_messages(
        &self,
        conversation: &ConversationRef,
    ) -> impl Future<Output = Result<Vec<RawMessage>, BackendError>> + Send;

    /// Fetch sidebar summaries of every conversation of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or refuses.
    fn fetch_summaries(
        &self,
        kind: ConversationKind,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, BackendError>> + Send;

    /// Record that the local user has seen `conversation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or refuses.
    fn mark_read(
        &self,
        conversation: &ConversationRef,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Persist a new message and return it as the service stored it.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or refuses.
    fn send_message(
        &self,
        conversation: &ConversationRef,
        draft: &MessageDraft,
    ) -> impl Future<Output = Result<RawMessage, BackendError>> + Send;
}
