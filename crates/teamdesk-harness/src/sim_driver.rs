//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` records everything the runtime surfaces so tests can assert on
//! it after the driver has been moved into a [`teamdesk_app::Runtime`]. The
//! recording lives behind a shared [`Recording`] handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use teamdesk_app::Driver;
use teamdesk_core::{ConversationRef, ConversationSummary, MessageDraft, MessageId};
use teamdesk_sync::{Cue, Notification, SyncError, Timeline};

use crate::invariants::{InvariantRegistry, SystemSnapshot};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Everything the runtime asked the driver to surface.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// Message ids of every timeline render, in order. `None` for the empty
    /// state.
    pub timelines: Vec<Option<(ConversationRef, Vec<MessageId>)>>,
    /// Sidebar renders as (conversation, unread) lists.
    pub sidebars: Vec<Vec<(ConversationRef, u32)>>,
    /// Raised notifications.
    pub notifications: Vec<Notification>,
    /// Played cues.
    pub cues: Vec<Cue>,
    /// Reported errors.
    pub errors: Vec<SyncError>,
    /// Drafts handed back to the composer.
    pub restored_drafts: Vec<(ConversationRef, MessageDraft)>,
    /// Whether the driver was stopped.
    pub stopped: bool,
}

impl Recorded {
    /// Ids shown by the latest timeline render.
    pub fn latest_timeline(&self) -> Option<&[MessageId]> {
        self.timelines.last()?.as_ref().map(|(_, ids)| ids.as_slice())
    }

    /// Unread counts shown by the latest sidebar render.
    pub fn latest_sidebar(&self) -> Option<&[(ConversationRef, u32)]> {
        self.sidebars.last().map(Vec::as_slice)
    }
}

/// Shared handle on a [`SimDriver`]'s recording.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    inner: Arc<Mutex<Recorded>>,
    fail_renders: Arc<Mutex<bool>>,
}

impl Recording {
    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Recorded {
        self.lock().clone()
    }

    /// Make every subsequent render fail.
    pub fn fail_renders(&self) {
        *self.fail_renders.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn renders_fail(&self) -> bool {
        *self.fail_renders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulation driver for deterministic testing.
///
/// Implements [`Driver`] so the same [`teamdesk_app::Runtime`] orchestration
/// code runs in both production and simulation tests.
#[derive(Default)]
pub struct SimDriver {
    recording: Recording,
    invariants: Option<InvariantRegistry>,
    history: SystemSnapshot,
}

impl SimDriver {
    /// Create a new simulation driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable invariant checking on every timeline and sidebar render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Handle for inspecting the recording after the driver moved away.
    pub fn recording(&self) -> Recording {
        self.recording.clone()
    }

    fn check_invariants(&self, context: &str) {
        if let Some(ref registry) = self.invariants {
            registry.assert_all(&self.history, context);
        }
    }

    fn guard_render(&self) -> Result<(), SimDriverError> {
        if self.recording.renders_fail() {
            return Err(SimDriverError("render failed".into()));
        }
        Ok(())
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    fn render_timeline(&mut self, timeline: Option<&Timeline>) -> Result<(), Self::Error> {
        self.guard_render()?;
        self.history.observe_timeline(timeline);
        self.check_invariants("after timeline render");

        let rendered = timeline.map(|timeline| {
            let ids = timeline.messages().iter().map(|m| m.id.clone()).collect();
            (timeline.conversation().clone(), ids)
        });
        self.recording.lock().timelines.push(rendered);
        Ok(())
    }

    fn render_sidebar(&mut self, summaries: &[&ConversationSummary]) -> Result<(), Self::Error> {
        self.guard_render()?;
        self.history.observe_sidebar(summaries.iter().copied());
        self.check_invariants("after sidebar render");

        let rendered =
            summaries.iter().map(|s| (s.conversation.clone(), s.unread_count)).collect();
        self.recording.lock().sidebars.push(rendered);
        Ok(())
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), Self::Error> {
        self.recording.lock().notifications.push(notification.clone());
        Ok(())
    }

    fn play_cue(&mut self, cue: Cue) -> Result<(), Self::Error> {
        self.recording.lock().cues.push(cue);
        Ok(())
    }

    fn report_error(&mut self, error: &SyncError) -> Result<(), Self::Error> {
        self.recording.lock().errors.push(error.clone());
        Ok(())
    }

    fn restore_draft(
        &mut self,
        conversation: &ConversationRef,
        draft: MessageDraft,
    ) -> Result<(), Self::Error> {
        self.recording.lock().restored_drafts.push((conversation.clone(), draft));
        Ok(())
    }

    fn stop(&mut self) {
        self.recording.lock().stopped = true;
    }
}
