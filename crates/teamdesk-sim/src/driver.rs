//! Driver that reports everything through `tracing`.

use std::convert::Infallible;

use teamdesk_app::Driver;
use teamdesk_core::{ConversationRef, ConversationSummary, MessageDraft};
use teamdesk_sync::{Cue, Notification, SyncError, Timeline};

/// Stand-in for a UI: logs renders, notifications and cues.
#[derive(Debug, Default)]
pub struct TracingDriver {
    renders: u64,
}

impl TracingDriver {
    /// Create a driver.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for TracingDriver {
    type Error = Infallible;

    fn render_timeline(&mut self, timeline: Option<&Timeline>) -> Result<(), Self::Error> {
        self.renders += 1;
        match timeline {
            Some(timeline) => {
                let last = timeline.last().map(|m| {
                    let body = m.content.as_deref().unwrap_or("[attachment]");
                    format!("{}: {body}", m.sender_name)
                });
                tracing::info!(
                    conversation = %timeline.conversation(),
                    messages = timeline.len(),
                    last = last.as_deref().unwrap_or("-"),
                    render = self.renders,
                    "timeline"
                );
            },
            None => tracing::info!(render = self.renders, "timeline closed"),
        }
        Ok(())
    }

    fn render_sidebar(&mut self, summaries: &[&ConversationSummary]) -> Result<(), Self::Error> {
        let unread: Vec<String> = summaries
            .iter()
            .filter(|s| s.unread_count > 0)
            .map(|s| format!("{}={}", s.display_name, s.unread_count))
            .collect();
        tracing::info!(conversations = summaries.len(), unread = %unread.join(","), "sidebar");
        Ok(())
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), Self::Error> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            link = %notification.deep_link,
            "notification"
        );
        Ok(())
    }

    fn play_cue(&mut self, cue: Cue) -> Result<(), Self::Error> {
        tracing::debug!(?cue, "cue");
        Ok(())
    }

    fn report_error(&mut self, error: &SyncError) -> Result<(), Self::Error> {
        tracing::warn!(%error, "user-facing error");
        Ok(())
    }

    fn restore_draft(
        &mut self,
        conversation: &ConversationRef,
        draft: MessageDraft,
    ) -> Result<(), Self::Error> {
        tracing::info!(%conversation, content = %draft.content, "draft restored");
        Ok(())
    }

    fn stop(&mut self) {
        tracing::info!(renders = self.renders, "driver stopped");
    }
}
