//! Simulated backing service implementing the Backend trait.
//!
//! `SimBackend` serves from a shared [`ServerStore`] and lets a test control
//! the two things that matter for sync behavior: when message fetches
//! complete (a gate that holds them until released) and whether calls fail
//! (seeded random failure injection).

use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use teamdesk_app::Backend;
use teamdesk_core::{
    BackendError, ConversationKind, ConversationRef, ConversationSummary, MessageDraft,
    PayloadError, PushEvent, RawMessage, UserId,
};
use tokio::sync::Semaphore;

use crate::ServerStore;

/// Number of calls the backend has served, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `fetch_messages` calls started.
    pub fetch_messages: usize,
    /// `fetch_summaries` calls started (one per kind).
    pub fetch_summaries: usize,
    /// `mark_read` calls started.
    pub mark_read: usize,
    /// `send_message` calls started.
    pub send_message: usize,
}

#[derive(Debug, Default)]
struct Counters {
    fetch_messages: AtomicUsize,
    fetch_summaries: AtomicUsize,
    mark_read: AtomicUsize,
    send_message: AtomicUsize,
}

#[derive(Debug)]
struct FaultPlan {
    rng: ChaCha8Rng,
    failure_rate: f64,
    fail_sends: bool,
}

/// In-memory backend with controllable latency and failures.
#[derive(Debug, Clone)]
pub struct SimBackend {
    store: Arc<Mutex<ServerStore>>,
    faults: Arc<Mutex<FaultPlan>>,
    counters: Arc<Counters>,
    hold_fetches: Arc<AtomicBool>,
    waiting: Arc<AtomicUsize>,
    gate: Arc<Semaphore>,
}

impl SimBackend {
    /// Backend over an empty store serving `local_user`.
    pub fn new(local_user: UserId, local_name: &str) -> Self {
        Self::with_store(ServerStore::new(local_user, local_name))
    }

    /// Backend over an existing store.
    pub fn with_store(store: ServerStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            faults: Arc::new(Mutex::new(FaultPlan {
                rng: ChaCha8Rng::seed_from_u64(0),
                failure_rate: 0.0,
                fail_sends: false,
            })),
            counters: Arc::new(Counters::default()),
            hold_fetches: Arc::new(AtomicBool::new(false)),
            waiting: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Fail a fraction of all calls, decided by an RNG seeded with `seed`.
    #[must_use]
    pub fn with_failure_rate(self, seed: u64, failure_rate: f64) -> Self {
        {
            let mut faults = lock(&self.faults);
            faults.rng = ChaCha8Rng::seed_from_u64(seed);
            faults.failure_rate = failure_rate.clamp(0.0, 1.0);
        }
        self
    }

    /// Make every send fail until [`SimBackend::accept_sends`] is called.
    pub fn reject_sends(&self) {
        lock(&self.faults).fail_sends = true;
    }

    /// Undo [`SimBackend::reject_sends`].
    pub fn accept_sends(&self) {
        lock(&self.faults).fail_sends = false;
    }

    /// Hold every message fetch until released.
    pub fn hold_fetches(&self) {
        self.hold_fetches.store(true, Ordering::SeqCst);
    }

    /// Let `count` held fetches complete.
    pub fn release_fetches(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Stop holding fetches and release every waiting one.
    pub fn resume_fetches(&self) {
        self.hold_fetches.store(false, Ordering::SeqCst);
        self.gate.add_permits(self.waiting.load(Ordering::SeqCst));
    }

    /// Fetches currently held at the gate.
    pub fn held_fetches(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Access the store, e.g. to post messages from other users.
    pub fn store(&self) -> MutexGuard<'_, ServerStore> {
        lock(&self.store)
    }

    /// Persist a message from `sender` and encode the matching push frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be encoded.
    pub fn post_frame(
        &self,
        conversation: &ConversationRef,
        sender: &UserId,
        sender_name: &str,
        content: &str,
    ) -> Result<Vec<u8>, PayloadError> {
        let message = self.store().post(conversation, sender, sender_name, content);
        PushEvent { message }.encode()
    }

    /// Calls served so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            fetch_messages: self.counters.fetch_messages.load(Ordering::SeqCst),
            fetch_summaries: self.counters.fetch_summaries.load(Ordering::SeqCst),
            mark_read: self.counters.mark_read.load(Ordering::SeqCst),
            send_message: self.counters.send_message.load(Ordering::SeqCst),
        }
    }

    fn injected_failure(&self) -> Result<(), BackendError> {
        let mut faults = lock(&self.faults);
        let rate = faults.failure_rate;
        if rate > 0.0 && faults.rng.gen_bool(rate) {
            return Err(BackendError::Transport("injected failure".into()));
        }
        Ok(())
    }

    async fn wait_for_gate(&self) {
        if !self.hold_fetches.load(Ordering::SeqCst) {
            return;
        }
        self.waiting.fetch_add(1, Ordering::SeqCst);
        match self.gate.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => tracing::debug!("fetch gate closed"),
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Backend for SimBackend {
    fn fetch_messages(
        &self,
        conversation: &ConversationRef,
    ) -> impl Future<Output = Result<Vec<RawMessage>, BackendError>> + Send {
        let this = self.clone();
        let conversation = conversation.clone();
        async move {
            this.counters.fetch_messages.fetch_add(1, Ordering::SeqCst);
            this.wait_for_gate().await;
            this.injected_failure()?;
            // Read after the gate so a held fetch sees posts made meanwhile.
            Ok(this.store().messages(&conversation))
        }
    }

    fn fetch_summaries(
        &self,
        kind: ConversationKind,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, BackendError>> + Send {
        let this = self.clone();
        async move {
            this.counters.fetch_summaries.fetch_add(1, Ordering::SeqCst);
            this.injected_failure()?;
            Ok(this.store().summaries(kind))
        }
    }

    fn mark_read(
        &self,
        conversation: &ConversationRef,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        let this = self.clone();
        let conversation = conversation.clone();
        async move {
            this.counters.mark_read.fetch_add(1, Ordering::SeqCst);
            this.injected_failure()?;
            this.store().mark_read(&conversation);
            Ok(())
        }
    }

    fn send_message(
        &self,
        conversation: &ConversationRef,
        draft: &MessageDraft,
    ) -> impl Future<Output = Result<RawMessage, BackendError>> + Send {
        let this = self.clone();
        let conversation = conversation.clone();
        let draft = draft.clone();
        async move {
            this.counters.send_message.fetch_add(1, Ordering::SeqCst);
            if lock(&this.faults).fail_sends {
                return Err(BackendError::Rejected { status: 503, reason: "unavailable".into() });
            }
            this.injected_failure()?;
            Ok(this.store().send(&conversation, &draft))
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SimBackend {
        SimBackend::new(UserId::from("me"), "Grace")
    }

    #[test]
    fn failure_injection_is_seeded() {
        let outcomes = |seed| {
            let backend = backend().with_failure_rate(seed, 0.5);
            (0..32).map(|_| backend.injected_failure().is_err()).collect::<Vec<_>>()
        };

        assert_eq!(outcomes(7), outcomes(7));
        assert!(outcomes(7).contains(&true));
        assert!(outcomes(7).contains(&false));
    }

    #[test]
    fn post_frame_decodes_to_stored_message() {
        let backend = backend();
        let general = ConversationRef::channel("general");

        let frame = backend.post_frame(&general, &UserId::from("ada"), "Ada", "hi");
        let decoded = frame.and_then(|bytes| PushEvent::decode(&bytes));

        assert_eq!(decoded.map(|push| push.message.channel_id), Ok(Some("general".into())));
        assert_eq!(backend.store().message_ids(&general).len(), 1);
    }
}
