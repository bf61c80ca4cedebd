//! Sync engine state machine.
//!
//! [`SyncEngine`] composes the timeline, the accountant, the poll scheduler
//! and the read-receipt committer. It performs no I/O: every event goes in
//! through [`SyncEngine::handle`] and comes out as [`SyncAction`]s for the
//! runtime to execute.

use std::time::Duration;

use teamdesk_core::{
    BackendError, ConversationRef, ConversationSummary, LocalUser, Message, MessageDraft, PushEvent,
    RawMessage, env::Environment,
};

use crate::{
    Accountant, Cue, FetchOrigin, Generation, PollScheduler, ReadReceiptCommitter, ReceiptOrigin,
    SyncAction, SyncError, SyncEvent, TickRejection, Timeline,
};

/// Default lifetime of notification de-duplication entries.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(60);

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Signed-in user.
    pub local_user: LocalUser,
    /// How long a push notification suppresses the matching delta
    /// notification.
    pub notification_ttl: Duration,
}

impl SyncConfig {
    /// Configuration with default timings.
    pub fn new(local_user: LocalUser) -> Self {
        Self { local_user, notification_ttl: DEFAULT_NOTIFICATION_TTL }
    }
}

/// The open conversation.
#[derive(Debug, Clone)]
struct OpenConversation {
    timeline: Timeline,
    /// Whether a snapshot has been loaded since the switch. Until then the
    /// timeline only holds push events that raced the initial fetch.
    loaded: bool,
}

/// Conversation synchronization engine.
pub struct SyncEngine<E: Environment> {
    env: E,
    local_user: LocalUser,
    session_active: bool,
    open: Option<OpenConversation>,
    accountant: Accountant<E::Instant>,
    scheduler: PollScheduler,
    receipts: ReadReceiptCommitter,
}

impl<E: Environment> SyncEngine<E> {
    /// Create an engine with no session and no open conversation.
    pub fn new(env: E, config: SyncConfig) -> Self {
        Self {
            env,
            accountant: Accountant::new(config.local_user.clone(), config.notification_ttl),
            local_user: config.local_user,
            session_active: false,
            open: None,
            scheduler: PollScheduler::new(),
            receipts: ReadReceiptCommitter::new(),
        }
    }

    /// Signed-in user.
    pub fn local_user(&self) -> &LocalUser {
        &self.local_user
    }

    /// Whether the session is established.
    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    /// Conversation currently open.
    pub fn open_conversation(&self) -> Option<&ConversationRef> {
        self.open.as_ref().map(|open| open.timeline.conversation())
    }

    /// Timeline of the open conversation.
    pub fn timeline(&self) -> Option<&Timeline> {
        self.open.as_ref().map(|open| &open.timeline)
    }

    /// Whether the open conversation's initial snapshot has arrived.
    pub fn is_loaded(&self) -> bool {
        self.open.as_ref().is_some_and(|open| open.loaded)
    }

    /// Unread counters and sidebar summaries.
    pub fn accountant(&self) -> &Accountant<E::Instant> {
        &self.accountant
    }

    /// Poll bookkeeping.
    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    /// Read-receipt bookkeeping.
    pub fn receipts(&self) -> &ReadReceiptCommitter {
        &self.receipts
    }

    /// Process an event and return the actions to execute, in order.
    pub fn handle(&mut self, event: SyncEvent) -> Vec<SyncAction> {
        match event {
            SyncEvent::SessionStarted => self.handle_session_started(),
            SyncEvent::SignedOut => self.handle_signed_out(),
            SyncEvent::OpenConversation(conversation) => self.handle_open(conversation),
            SyncEvent::CloseConversation => self.handle_close(),
            SyncEvent::ForegroundTick { generation } => self.handle_foreground_tick(generation),
            SyncEvent::BackgroundTick { generation } => self.handle_background_tick(generation),
            SyncEvent::MessagesFetched { conversation, generation, origin, result } => {
                match result {
                    Ok(raw) => self.handle_snapshot(&conversation, generation, raw),
                    Err(source) => {
                        if !self.scheduler.finish_foreground(generation, &conversation) {
                            tracing::debug!(%conversation, generation, "discarding stale fetch failure");
                            return Vec::new();
                        }
                        match origin {
                            FetchOrigin::Switch => {
                                tracing::warn!(%conversation, error = %source, "conversation load failed");
                                vec![SyncAction::ReportError(SyncError::SwitchFailed {
                                    conversation,
                                    source,
                                })]
                            },
                            FetchOrigin::Poll => {
                                // The next tick retries; only lasting failures are worth a warning.
                                if source.is_transient() {
                                    tracing::debug!(%conversation, error = %source, "foreground poll skipped");
                                } else {
                                    tracing::warn!(%conversation, error = %source, "foreground poll skipped");
                                }
                                Vec::new()
                            },
                        }
                    },
                }
            },
            SyncEvent::SummariesFetched { generation, result } => {
                self.handle_summaries(generation, result)
            },
            SyncEvent::PushFrame(bytes) => match PushEvent::decode(&bytes) {
                Ok(push) => self.handle_push(push),
                Err(err) => {
                    tracing::warn!(error = %err, len = bytes.len(), "dropping undecodable push frame");
                    Vec::new()
                },
            },
            SyncEvent::PushReceived(push) => self.handle_push(push),
            SyncEvent::MarkReadRequested => self.handle_mark_read_requested(),
            SyncEvent::MarkReadCompleted { conversation, origin, result } => self
                .receipts
                .complete(&conversation, origin, result)
                .map(SyncAction::ReportError)
                .into_iter()
                .collect(),
            SyncEvent::SendRequested(draft) => self.handle_send_requested(draft),
            SyncEvent::SendCompleted { conversation, draft, result } => {
                self.handle_send_completed(conversation, draft, result)
            },
        }
    }

    fn handle_session_started(&mut self) -> Vec<SyncAction> {
        let generation = self.scheduler.start_background();
        self.session_active = true;
        tracing::info!(user = %self.local_user.id, generation, "session started");

        // The first summary fetch goes out immediately rather than one
        // period later, and counts as the in-flight cycle.
        let mut actions = vec![SyncAction::ScheduleBackgroundPoll { generation }];
        if self.scheduler.begin_background(generation).is_ok() {
            actions.push(SyncAction::FetchSummaries { generation });
        }
        actions
    }

    fn handle_signed_out(&mut self) -> Vec<SyncAction> {
        tracing::info!(user = %self.local_user.id, "signed out");

        self.scheduler.stop_foreground();
        self.scheduler.stop_background();
        self.session_active = false;
        self.accountant.reset();
        self.receipts.reset();

        let mut actions = vec![SyncAction::CancelForegroundPoll, SyncAction::CancelBackgroundPoll];
        if self.open.take().is_some() {
            actions.push(SyncAction::TimelineClosed);
        }
        actions.push(SyncAction::SummariesUpdated);
        actions
    }

    fn handle_open(&mut self, conversation: ConversationRef) -> Vec<SyncAction> {
        if self.open_conversation() == Some(&conversation) {
            tracing::debug!(%conversation, "conversation already open");
            return Vec::new();
        }

        let generation = self.scheduler.start_foreground(conversation.clone());
        // Results of the previous conversation's fetches are now stale.
        self.open = Some(OpenConversation {
            timeline: Timeline::new(conversation.clone()),
            loaded: false,
        });
        tracing::info!(%conversation, generation, "opening conversation");

        let mut actions = vec![SyncAction::ScheduleForegroundPoll { generation }];
        if self.scheduler.begin_foreground(generation).is_ok() {
            actions.push(SyncAction::FetchMessages {
                conversation: conversation.clone(),
                generation,
                origin: FetchOrigin::Switch,
            });
        }
        actions.push(SyncAction::TimelineUpdated { conversation: conversation.clone() });
        if self.accountant.reset_on_open(&conversation) {
            actions.push(SyncAction::SummariesUpdated);
        }
        actions
    }

    fn handle_close(&mut self) -> Vec<SyncAction> {
        let Some(open) = self.open.take() else {
            return Vec::new();
        };
        tracing::info!(conversation = %open.timeline.conversation(), "closing conversation");

        self.scheduler.stop_foreground();
        self.accountant.clear_open();
        vec![SyncAction::CancelForegroundPoll, SyncAction::TimelineClosed]
    }

    fn handle_foreground_tick(&mut self, generation: Generation) -> Vec<SyncAction> {
        match self.scheduler.begin_foreground(generation) {
            Ok(conversation) => {
                vec![SyncAction::FetchMessages { conversation, generation, origin: FetchOrigin::Poll }]
            },
            Err(TickRejection::Stale) => {
                tracing::debug!(generation, "ignoring stale foreground tick");
                Vec::new()
            },
            Err(TickRejection::InFlight) => {
                tracing::debug!(generation, "foreground poll still in flight, dropping tick");
                Vec::new()
            },
        }
    }

    fn handle_background_tick(&mut self, generation: Generation) -> Vec<SyncAction> {
        match self.scheduler.begin_background(generation) {
            Ok(()) => vec![SyncAction::FetchSummaries { generation }],
            Err(TickRejection::Stale) => {
                tracing::debug!(generation, "ignoring stale background tick");
                Vec::new()
            },
            Err(TickRejection::InFlight) => {
                tracing::debug!(generation, "background poll still in flight, dropping tick");
                Vec::new()
            },
        }
    }

    fn handle_snapshot(
        &mut self,
        conversation: &ConversationRef,
        generation: Generation,
        raw: Vec<RawMessage>,
    ) -> Vec<SyncAction> {
        if !self.scheduler.finish_foreground(generation, conversation) {
            tracing::debug!(%conversation, generation, "discarding stale snapshot");
            return Vec::new();
        }
        let Some(open) = self.open.as_mut() else {
            return Vec::new();
        };

        let messages = validate_snapshot(conversation, raw);
        let changed = if open.loaded {
            let outcome = open.timeline.merge_snapshot(messages);
            tracing::debug!(
                %conversation,
                appended = outcome.appended,
                receipts = outcome.receipts_widened,
                revised = outcome.revised,
                "merged snapshot"
            );
            outcome.changed()
        } else {
            // Push events that arrived while the load was outstanding are
            // folded back in after the wholesale replacement.
            let early = std::mem::replace(&mut open.timeline, Timeline::new(conversation.clone()))
                .into_messages();
            let held = open.timeline.load_snapshot(messages);
            open.timeline.merge_snapshot(early);
            open.loaded = true;
            tracing::debug!(%conversation, held, "loaded snapshot");
            true
        };

        let commit =
            self.receipts.commit(&mut open.timeline, &self.local_user.id, ReceiptOrigin::Background);
        let mut actions: Vec<SyncAction> = commit.action.into_iter().collect();
        if changed || commit.widened > 0 {
            actions.push(SyncAction::TimelineUpdated { conversation: conversation.clone() });
        }
        actions
    }

    fn handle_summaries(
        &mut self,
        generation: Generation,
        result: Result<Vec<ConversationSummary>, BackendError>,
    ) -> Vec<SyncAction> {
        if !self.scheduler.finish_background(generation) {
            tracing::debug!(generation, "discarding stale summaries");
            return Vec::new();
        }

        match result {
            Ok(summaries) => {
                let notifications = self.accountant.apply_summaries(summaries, self.env.now());
                let mut actions = vec![SyncAction::SummariesUpdated];
                actions.extend(notifications.into_iter().map(SyncAction::Notify));
                actions
            },
            Err(err) => {
                if err.is_transient() {
                    tracing::debug!(error = %err, "background poll skipped");
                } else {
                    tracing::warn!(error = %err, "background poll skipped");
                }
                Vec::new()
            },
        }
    }

    fn handle_push(&mut self, push: PushEvent) -> Vec<SyncAction> {
        let message = match Message::try_from(push.message) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed push event");
                return Vec::new();
            },
        };
        let own = message.is_authored_by(&self.local_user.id);
        let cue = self.cue_for(&message);

        if let Some(open) =
            self.open.as_mut().filter(|open| open.timeline.conversation() == &message.conversation)
        {
            let conversation = message.conversation.clone();
            if !open.timeline.append_if_new(message) {
                tracing::trace!(%conversation, "push event already held");
                return Vec::new();
            }
            return vec![SyncAction::TimelineUpdated { conversation }, SyncAction::PlayCue(cue)];
        }

        if own {
            self.accountant.record_own_activity(&message);
            return vec![SyncAction::PlayCue(cue)];
        }

        match self.accountant.record_foreign_event(&message, self.env.now()) {
            Some(notification) => vec![
                SyncAction::SummariesUpdated,
                SyncAction::Notify(notification),
                SyncAction::PlayCue(cue),
            ],
            None => Vec::new(),
        }
    }

    fn handle_mark_read_requested(&mut self) -> Vec<SyncAction> {
        let Some(open) = self.open.as_mut() else {
            return vec![SyncAction::ReportError(SyncError::NoOpenConversation)];
        };
        let conversation = open.timeline.conversation().clone();

        // Joins a commit already in flight rather than being dropped.
        let commit =
            self.receipts.commit(&mut open.timeline, &self.local_user.id, ReceiptOrigin::Manual);
        let mut actions: Vec<SyncAction> = commit.action.into_iter().collect();
        if commit.widened > 0 {
            actions.push(SyncAction::TimelineUpdated { conversation });
        }
        actions
    }

    fn handle_send_requested(&mut self, draft: MessageDraft) -> Vec<SyncAction> {
        let Some(conversation) = self.open_conversation().cloned() else {
            return vec![SyncAction::ReportError(SyncError::NoOpenConversation)];
        };
        if draft.is_blank() && draft.reply_to.is_none() {
            return vec![SyncAction::ReportError(SyncError::EmptyDraft)];
        }
        vec![SyncAction::SendMessage { conversation, draft }]
    }

    fn handle_send_completed(
        &mut self,
        conversation: ConversationRef,
        draft: MessageDraft,
        result: Result<RawMessage, BackendError>,
    ) -> Vec<SyncAction> {
        let raw = match result {
            Ok(raw) => raw,
            Err(source) => {
                tracing::warn!(%conversation, error = %source, "send failed");
                return vec![
                    SyncAction::ReportError(SyncError::SendFailed { source }),
                    SyncAction::PlayCue(Cue::Error),
                    SyncAction::RestoreDraft { conversation, draft },
                ];
            },
        };

        let message = match Message::try_from(raw) {
            Ok(message) => message,
            Err(err) => {
                // Accepted by the service; the next poll brings it in.
                tracing::warn!(%conversation, error = %err, "send response malformed");
                return vec![SyncAction::PlayCue(Cue::Sent)];
            },
        };

        let Some(open) = self.open.as_mut().filter(|open| open.timeline.conversation() == &conversation)
        else {
            return vec![SyncAction::PlayCue(Cue::Sent)];
        };

        // A push echo may have landed first and already played the cue.
        if open.timeline.append_if_new(message) {
            vec![SyncAction::TimelineUpdated { conversation }, SyncAction::PlayCue(Cue::Sent)]
        } else {
            Vec::new()
        }
    }

    fn cue_for(&self, message: &Message) -> Cue {
        if message.is_authored_by(&self.local_user.id) {
            Cue::Sent
        } else if message.mentions(&self.local_user.display_name) {
            Cue::Mention
        } else {
            Cue::Received
        }
    }
}

/// Convert a fetched snapshot, dropping entries that are malformed or belong
/// to a different conversation.
fn validate_snapshot(conversation: &ConversationRef, raw: Vec<RawMessage>) -> Vec<Message> {
    raw.into_iter()
        .filter_map(|raw| match Message::try_from(raw) {
            Ok(message) if &message.conversation == conversation => Some(message),
            Ok(message) => {
                tracing::warn!(
                    requested = %conversation,
                    found = %message.conversation,
                    id = %message.id,
                    "dropping snapshot entry for another conversation"
                );
                None
            },
            Err(err) => {
                tracing::warn!(%conversation, error = %err, "dropping malformed snapshot entry");
                None
            },
        })
        .collect()
}
