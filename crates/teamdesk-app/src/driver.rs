//! Driver trait for abstracting the user-facing surface.
//!
//! The [`Driver`] trait decouples the runtime from any particular UI. Each
//! frontend implements the trait to render state and surface notifications,
//! while the generic [`crate::Runtime`] handles all orchestration.

use teamdesk_core::{ConversationRef, ConversationSummary, MessageDraft};
use teamdesk_sync::{Cue, Notification, SyncError, Timeline};

/// Abstracts rendering and system integration for the runtime.
///
/// Implementations provide platform-specific output while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in production and simulation.
///
/// # Implementations
///
/// - **Simulation**: records every call for assertions
/// - **Headless**: logs through `tracing` (the `teamdesk-sim` binary)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Render the open conversation's timeline, or the empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render_timeline(&mut self, timeline: Option<&Timeline>) -> Result<(), Self::Error>;

    /// Render the sidebar.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render_sidebar(&mut self, summaries: &[&ConversationSummary]) -> Result<(), Self::Error>;

    /// Show a system notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be shown.
    fn notify(&mut self, notification: &Notification) -> Result<(), Self::Error>;

    /// Play an audible cue.
    ///
    /// # Errors
    ///
    /// Returns an error if the cue cannot be played.
    fn play_cue(&mut self, cue: Cue) -> Result<(), Self::Error>;

    /// Show a user-facing error.
    ///
    /// # Errors
    ///
    /// Returns an error if the error cannot be shown.
    fn report_error(&mut self, error: &SyncError) -> Result<(), Self::Error>;

    /// Put an unsent draft back into the composer of `conversation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the composer cannot be updated.
    fn restore_draft(
        &mut self,
        conversation: &ConversationRef,
        draft: MessageDraft,
    ) -> Result<(), Self::Error>;

    /// Release resources when the runtime stops.
    fn stop(&mut self) {}
}
