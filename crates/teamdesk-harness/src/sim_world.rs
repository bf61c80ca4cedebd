//! Synchronous simulation world.
//!
//! `SimWorld` wires one [`SyncEngine`] to a [`ServerStore`] without any async
//! runtime. Backend calls the engine requests are parked in a queue and
//! completed only when the test says so, in any order, which makes it easy to
//! reproduce races such as a fetch for a previous conversation landing after
//! a switch. Invariants are checked after every engine step.

use std::{collections::VecDeque, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use teamdesk_core::{
    BackendError, ConversationKind, ConversationRef, LocalUser, MessageDraft, MessageId,
    PushEvent, RawMessage, UserId,
};
use teamdesk_sync::{Generation, SyncAction, SyncConfig, SyncEngine, SyncEvent};

use crate::{InvariantRegistry, ServerStore, SimEnv, SystemSnapshot};

/// Foreground poll period used when a test fires the foreground timer.
pub const FOREGROUND_PERIOD: Duration = Duration::from_secs(15);

/// Background poll period used when a test fires the background timer.
pub const BACKGROUND_PERIOD: Duration = Duration::from_secs(30);

/// Upper bound on completions in one [`SimWorld::deliver_all`].
const MAX_DELIVERIES: usize = 1_000;

/// A backend call the engine asked for, not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall(SyncAction);

impl PendingCall {
    /// The action that requested the call.
    pub fn action(&self) -> &SyncAction {
        &self.0
    }

    /// Conversation the call concerns, if any.
    pub fn conversation(&self) -> Option<&ConversationRef> {
        match &self.0 {
            SyncAction::FetchMessages { conversation, .. }
            | SyncAction::MarkRead { conversation, .. }
            | SyncAction::SendMessage { conversation, .. } => Some(conversation),
            _ => None,
        }
    }
}

/// Engine plus authoritative store plus a queue of outstanding calls.
pub struct SimWorld {
    env: SimEnv,
    engine: SyncEngine<SimEnv>,
    store: ServerStore,
    pending: VecDeque<PendingCall>,
    foreground: Option<Generation>,
    background: Option<Generation>,
    surfaced: Vec<SyncAction>,
    history: SystemSnapshot,
    invariants: InvariantRegistry,
    rng: ChaCha8Rng,
    failure_rate: f64,
}

impl SimWorld {
    /// World for the local user "me" (Grace), seeded for failure injection.
    pub fn new(seed: u64) -> Self {
        let local = LocalUser::new("me", "Grace");
        let env = SimEnv::new();
        let engine = SyncEngine::new(env.clone(), SyncConfig::new(local.clone()));

        let mut store = ServerStore::new(local.id, local.display_name);
        store.add_conversation(ConversationRef::channel("general"), "general");
        store.add_conversation(ConversationRef::group("ops"), "ops");
        store.add_conversation(ConversationRef::dm("ada-grace"), "Ada");

        Self {
            env,
            engine,
            store,
            pending: VecDeque::new(),
            foreground: None,
            background: None,
            surfaced: Vec::new(),
            history: SystemSnapshot::empty(),
            invariants: InvariantRegistry::standard(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            failure_rate: 0.0,
        }
    }

    /// Fail a fraction of completed calls.
    pub fn set_failure_rate(&mut self, failure_rate: f64) {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
    }

    /// The engine under test.
    pub fn engine(&self) -> &SyncEngine<SimEnv> {
        &self.engine
    }

    /// The authoritative store.
    pub fn store(&self) -> &ServerStore {
        &self.store
    }

    /// Mutable access to the store, for out-of-band edits.
    pub fn store_mut(&mut self) -> &mut ServerStore {
        &mut self.store
    }

    /// The shared virtual clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Calls requested but not yet completed, oldest first.
    pub fn pending(&self) -> &VecDeque<PendingCall> {
        &self.pending
    }

    /// Take every user-visible action surfaced so far.
    pub fn drain_surfaced(&mut self) -> Vec<SyncAction> {
        std::mem::take(&mut self.surfaced)
    }

    /// Feed an event to the engine and route the resulting actions.
    pub fn handle(&mut self, event: SyncEvent) {
        for action in self.engine.handle(event) {
            match action {
                SyncAction::FetchMessages { .. }
                | SyncAction::FetchSummaries { .. }
                | SyncAction::MarkRead { .. }
                | SyncAction::SendMessage { .. } => self.pending.push_back(PendingCall(action)),
                SyncAction::ScheduleForegroundPoll { generation } => {
                    self.foreground = Some(generation);
                },
                SyncAction::CancelForegroundPoll => self.foreground = None,
                SyncAction::ScheduleBackgroundPoll { generation } => {
                    self.background = Some(generation);
                },
                SyncAction::CancelBackgroundPoll => self.background = None,
                surfaced => self.surfaced.push(surfaced),
            }
        }

        self.history.observe_engine(&self.engine);
        self.invariants.assert_all(&self.history, "after engine step");
    }

    /// Start the session.
    pub fn sign_in(&mut self) {
        self.handle(SyncEvent::SessionStarted);
    }

    /// Select a conversation.
    pub fn open(&mut self, conversation: &ConversationRef) {
        self.handle(SyncEvent::OpenConversation(conversation.clone()));
    }

    /// Persist a message from someone else without pushing it.
    pub fn post(
        &mut self,
        conversation: &ConversationRef,
        sender: &str,
        content: &str,
    ) -> RawMessage {
        self.store.post(conversation, &UserId::from(sender), sender, content)
    }

    /// Persist a message from someone else and push it.
    pub fn post_and_push(
        &mut self,
        conversation: &ConversationRef,
        sender: &str,
        content: &str,
    ) -> RawMessage {
        let raw = self.post(conversation, sender, content);
        self.push(raw.clone());
        raw
    }

    /// Deliver `message` over the push channel.
    pub fn push(&mut self, message: RawMessage) {
        self.handle(SyncEvent::PushReceived(PushEvent { message }));
    }

    /// Ask to send `content` to the open conversation.
    pub fn send(&mut self, content: &str) {
        self.handle(SyncEvent::SendRequested(MessageDraft::text(content)));
    }

    /// Advance the clock one foreground period and fire the foreground timer.
    ///
    /// Returns `false` if no foreground timer is scheduled.
    pub fn fire_foreground(&mut self) -> bool {
        self.env.advance(FOREGROUND_PERIOD);
        match self.foreground {
            Some(generation) => {
                self.handle(SyncEvent::ForegroundTick { generation });
                true
            },
            None => false,
        }
    }

    /// Advance the clock one background period and fire the background timer.
    ///
    /// Returns `false` if no background timer is scheduled.
    pub fn fire_background(&mut self) -> bool {
        self.env.advance(BACKGROUND_PERIOD);
        match self.background {
            Some(generation) => {
                self.handle(SyncEvent::BackgroundTick { generation });
                true
            },
            None => false,
        }
    }

    /// Complete the oldest outstanding call. Returns `false` if none.
    pub fn deliver_next(&mut self) -> bool {
        self.deliver(0)
    }

    /// Complete the newest outstanding call. Returns `false` if none.
    pub fn deliver_newest(&mut self) -> bool {
        match self.pending.len() {
            0 => false,
            len => self.deliver(len - 1),
        }
    }

    /// Complete the outstanding call at `index`. Returns `false` if none.
    pub fn deliver(&mut self, index: usize) -> bool {
        let Some(call) = self.pending.remove(index) else {
            return false;
        };
        if let Some(event) = self.execute(call.0) {
            self.handle(event);
        }
        true
    }

    /// Complete outstanding calls until none are left, including the calls
    /// that completions trigger.
    pub fn deliver_all(&mut self) {
        for _ in 0..MAX_DELIVERIES {
            if !self.deliver_next() {
                return;
            }
        }
        tracing::warn!(pending = self.pending.len(), "delivery bound reached");
    }

    /// Bring the engine up to date: finish outstanding calls, then run one
    /// foreground and one background cycle without failures.
    pub fn settle(&mut self) {
        let failure_rate = std::mem::replace(&mut self.failure_rate, 0.0);
        self.deliver_all();
        if self.fire_foreground() {
            self.deliver_all();
        }
        if self.fire_background() {
            self.deliver_all();
        }
        self.failure_rate = failure_rate;
    }

    /// Compare the engine's view with the store after [`SimWorld::settle`].
    ///
    /// # Errors
    ///
    /// Describes the first divergence found.
    pub fn check_convergence(&self) -> Result<(), String> {
        let open = self.engine.open_conversation();

        if let Some(timeline) = self.engine.timeline() {
            let shown: Vec<MessageId> = timeline.messages().iter().map(|m| m.id.clone()).collect();
            let stored = self.store.message_ids(timeline.conversation());
            if shown != stored {
                return Err(format!(
                    "{}: timeline {shown:?} but store has {stored:?}",
                    timeline.conversation()
                ));
            }
        }

        for conversation in self.store.conversations() {
            let shown = self.engine.accountant().unread_count(conversation);
            let expected =
                if Some(conversation) == open { 0 } else { self.store.unread_count(conversation) };
            if shown != expected {
                return Err(format!("{conversation}: unread {shown} but expected {expected}"));
            }
        }
        Ok(())
    }

    fn execute(&mut self, action: SyncAction) -> Option<SyncEvent> {
        let failure = self.injected_failure();
        let event = match action {
            SyncAction::FetchMessages { conversation, generation, origin } => {
                let result = match failure {
                    Some(err) => Err(err),
                    None => Ok(self.store.messages(&conversation)),
                };
                SyncEvent::MessagesFetched { conversation, generation, origin, result }
            },
            SyncAction::FetchSummaries { generation } => {
                let result = match failure {
                    Some(err) => Err(err),
                    None => Ok(ConversationKind::ALL
                        .into_iter()
                        .flat_map(|kind| self.store.summaries(kind))
                        .collect()),
                };
                SyncEvent::SummariesFetched { generation, result }
            },
            SyncAction::MarkRead { conversation, origin } => {
                let result = match failure {
                    Some(err) => Err(err),
                    None => {
                        self.store.mark_read(&conversation);
                        Ok(())
                    },
                };
                SyncEvent::MarkReadCompleted { conversation, origin, result }
            },
            SyncAction::SendMessage { conversation, draft } => {
                let result = match failure {
                    Some(err) => Err(err),
                    None => Ok(self.store.send(&conversation, &draft)),
                };
                SyncEvent::SendCompleted { conversation, draft, result }
            },
            other => {
                tracing::error!(action = ?other, "not a backend call");
                return None;
            },
        };
        Some(event)
    }

    fn injected_failure(&mut self) -> Option<BackendError> {
        (self.failure_rate > 0.0 && self.rng.gen_bool(self.failure_rate))
            .then(|| BackendError::Transport("injected failure".into()))
    }
}
