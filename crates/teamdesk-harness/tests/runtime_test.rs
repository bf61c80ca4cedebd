//! End-to-end tests of the async runtime under a paused clock.
//!
//! # Test Strategy
//!
//! Each test wires the real [`Runtime`] to a [`SimBackend`] and a
//! [`SimDriver`], then drives it the way a user and the service would:
//! commands through the [`RuntimeHandle`], push frames from the store, and
//! virtual time passing. Tokio's paused clock auto-advances whenever the
//! runtime is idle, so a 30 second wait costs nothing.
//!
//! # Oracle Pattern
//!
//! Tests end with checks on what the driver was asked to surface (renders,
//! notifications, cues, errors) and on how often the backend was called.
//! The driver also checks the standard invariants on every render.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use teamdesk_app::{Runtime, RuntimeConfig, RuntimeError, RuntimeHandle, SystemEnv, UserCommand};
use teamdesk_core::{ConversationRef, LocalUser, MessageDraft, UserId};
use teamdesk_harness::{InvariantRegistry, Recording, SimBackend, SimDriver};
use teamdesk_sync::{Cue, SyncError};
use tokio::task::JoinHandle;

struct Harness {
    handle: RuntimeHandle,
    backend: SimBackend,
    recording: Recording,
    task: JoinHandle<Result<(), RuntimeError>>,
}

impl Harness {
    async fn command(&self, command: UserCommand) {
        self.handle.command(command).await.unwrap();
        idle().await;
    }

    async fn push_from(&self, conversation: &ConversationRef, sender: &str, content: &str) {
        let frame = self.backend.post_frame(conversation, &UserId::from(sender), sender, content);
        self.handle.push(frame.unwrap()).await.unwrap();
        idle().await;
    }

    async fn quit(self) -> Recording {
        self.handle.command(UserCommand::Quit).await.unwrap();
        self.task.await.unwrap().unwrap();
        self.recording
    }
}

fn general() -> ConversationRef {
    ConversationRef::channel("general")
}

fn ops() -> ConversationRef {
    ConversationRef::group("ops")
}

fn backend() -> SimBackend {
    let backend = SimBackend::new(UserId::from("me"), "Grace");
    {
        let mut store = backend.store();
        store.add_conversation(general(), "general");
        store.add_conversation(ops(), "ops");
        store.post(&general(), &UserId::from("ada"), "Ada", "standup in 5");
        store.post(&general(), &UserId::from("lin"), "Lin", "on my way");
        store.post(&ops(), &UserId::from("ada"), "Ada", "deploy done");
    }
    backend
}

async fn start(backend: SimBackend) -> Harness {
    start_with(backend, RuntimeConfig::new(LocalUser::new("me", "Grace"))).await
}

async fn start_with(backend: SimBackend, config: RuntimeConfig) -> Harness {
    let driver = SimDriver::new().with_invariants(InvariantRegistry::standard());
    let recording = driver.recording();
    let (runtime, handle) = Runtime::new(backend.clone(), driver, SystemEnv::new(), config);
    let task = tokio::spawn(runtime.run());
    idle().await;
    Harness { handle, backend, recording, task }
}

/// Let the runtime drain everything that is ready without crossing a poll
/// boundary.
async fn idle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(start_paused = true)]
async fn open_loads_then_foreground_poll_picks_up_missed_messages() {
    let harness = start(backend()).await;
    harness.command(UserCommand::Open(general())).await;

    let ids = harness.backend.store().message_ids(&general());
    assert_eq!(harness.recording.snapshot().latest_timeline(), Some(ids.as_slice()));

    // Posted without a push: only the foreground poll can bring it in.
    harness.backend.store().post(&general(), &UserId::from("ada"), "Ada", "moved to room 2");
    tokio::time::sleep(Duration::from_secs(15)).await;

    let ids = harness.backend.store().message_ids(&general());
    assert_eq!(ids.len(), 3);
    assert_eq!(harness.recording.snapshot().latest_timeline(), Some(ids.as_slice()));
    assert_eq!(harness.backend.calls().fetch_messages, 2);

    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn idle_foreground_polls_do_not_rerender() {
    let harness = start(backend()).await;
    harness.command(UserCommand::Open(general())).await;
    let renders = harness.recording.snapshot().timelines.len();

    tokio::time::sleep(Duration::from_secs(45)).await;

    assert_eq!(harness.backend.calls().fetch_messages, 4);
    assert_eq!(harness.recording.snapshot().timelines.len(), renders);

    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn zero_poll_periods_fall_back_to_the_minimum() {
    let mut config = RuntimeConfig::new(LocalUser::new("me", "Grace"));
    config.foreground_period = Duration::ZERO;
    config.background_period = Duration::ZERO;
    let harness = start_with(backend(), config).await;
    harness.command(UserCommand::Open(general())).await;

    tokio::time::sleep(Duration::from_secs(1)).await;

    let calls = harness.backend.calls();
    assert!(calls.fetch_messages > 1);
    assert!(calls.fetch_summaries > 3);
    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn ticks_during_a_slow_fetch_are_dropped() {
    let harness = start(backend()).await;
    harness.backend.hold_fetches();
    harness.command(UserCommand::Open(general())).await;

    // Three foreground periods pass while the switch fetch hangs.
    tokio::time::sleep(Duration::from_secs(46)).await;
    assert_eq!(harness.backend.calls().fetch_messages, 1);
    assert_eq!(harness.backend.held_fetches(), 1);

    harness.backend.resume_fetches();
    idle().await;
    assert_eq!(harness.recording.snapshot().latest_timeline().map(<[_]>::len), Some(2));

    // Polling resumes once the cycle is finished.
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(harness.backend.calls().fetch_messages, 2);

    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn switching_discards_the_previous_conversations_snapshot() {
    let harness = start(backend()).await;
    harness.backend.hold_fetches();
    harness.command(UserCommand::Open(general())).await;
    harness.command(UserCommand::Open(ops())).await;
    assert_eq!(harness.backend.held_fetches(), 2);

    harness.backend.resume_fetches();
    idle().await;

    let recorded = harness.quit().await.snapshot();
    let ops_ids = {
        let (conversation, ids) = recorded.timelines.last().unwrap().clone().unwrap();
        assert_eq!(conversation, ops());
        ids
    };
    assert_eq!(ops_ids.len(), 1);
    // General's snapshot arrived after the switch and was never shown.
    assert!(recorded.timelines.iter().flatten().all(|(c, ids)| c != &general() || ids.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn push_for_another_conversation_counts_and_notifies() {
    let harness = start(backend()).await;
    harness.command(UserCommand::Open(general())).await;

    harness.push_from(&ops(), "lin", "rollback?").await;

    let recorded = harness.recording.snapshot();
    assert_eq!(recorded.notifications.len(), 1);
    let notification = &recorded.notifications[0];
    assert_eq!(notification.conversation, ops());
    assert_eq!(notification.body, "rollback?");
    assert_eq!(notification.deep_link, ops().deep_link());
    assert_eq!(recorded.cues, [Cue::Received]);

    // The store already counted "deploy done" before the session started.
    let sidebar = recorded.latest_sidebar().unwrap();
    assert!(sidebar.contains(&(ops(), 2)));
    assert!(sidebar.contains(&(general(), 0)));

    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn push_in_open_conversation_appends_with_one_cue() {
    let harness = start(backend()).await;
    harness.command(UserCommand::Open(general())).await;
    harness.push_from(&general(), "ada", "@grace can you review?").await;

    let recorded = harness.recording.snapshot();
    assert_eq!(recorded.latest_timeline().map(<[_]>::len), Some(3));
    assert_eq!(recorded.cues, [Cue::Mention]);
    assert!(recorded.notifications.is_empty());

    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn background_poll_notifies_missed_messages_once() {
    let harness = start(backend()).await;
    {
        let mut store = harness.backend.store();
        store.post(&ops(), &UserId::from("ada"), "Ada", "one");
        store.post(&ops(), &UserId::from("ada"), "Ada", "two");
    }

    tokio::time::sleep(Duration::from_secs(30)).await;
    let recorded = harness.recording.snapshot();
    assert_eq!(recorded.notifications.len(), 1);
    assert_eq!(recorded.notifications[0].body, "2 new messages");

    // Nothing new: the next pass stays quiet.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.recording.snapshot().notifications.len(), 1);

    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn message_notified_by_push_is_not_repeated_by_the_poll() {
    let harness = start(backend()).await;

    // One message is missed by the push channel, the next one is not.
    harness.backend.store().post(&ops(), &UserId::from("ada"), "Ada", "missed");
    harness.push_from(&ops(), "ada", "delivered").await;
    assert_eq!(harness.recording.snapshot().notifications.len(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.recording.snapshot().notifications.len(), 1);

    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn failed_send_restores_the_draft_and_retry_succeeds() {
    let harness = start(backend()).await;
    harness.command(UserCommand::Open(general())).await;

    harness.backend.reject_sends();
    let draft = MessageDraft::text("ship it");
    harness.command(UserCommand::Send(draft.clone())).await;

    let recorded = harness.recording.snapshot();
    assert!(matches!(recorded.errors.as_slice(), [SyncError::SendFailed { .. }]));
    assert_eq!(recorded.cues, [Cue::Error]);
    assert_eq!(recorded.restored_drafts, [(general(), draft.clone())]);

    harness.backend.accept_sends();
    harness.command(UserCommand::Send(draft)).await;

    let recorded = harness.recording.snapshot();
    assert_eq!(recorded.cues, [Cue::Error, Cue::Sent]);
    assert_eq!(recorded.latest_timeline().map(<[_]>::len), Some(3));

    harness.quit().await;
}

#[tokio::test(start_paused = true)]
async fn notification_link_opens_its_conversation() {
    let harness = start(backend()).await;
    harness.command(UserCommand::ActivateNotification(ops().deep_link())).await;
    harness.command(UserCommand::ActivateNotification("type=nope&id=1".into())).await;

    let recorded = harness.quit().await.snapshot();
    let (conversation, _) = recorded.timelines.last().unwrap().clone().unwrap();
    assert_eq!(conversation, ops());
}

#[tokio::test(start_paused = true)]
async fn sign_out_stops_polling_and_clears_the_view() {
    let harness = start(backend()).await;
    harness.command(UserCommand::Open(general())).await;
    harness.command(UserCommand::SignOut).await;
    let calls = harness.backend.calls();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(harness.backend.calls(), calls);

    let recorded = harness.quit().await.snapshot();
    assert_eq!(recorded.timelines.last(), Some(&None));
    assert_eq!(recorded.latest_sidebar(), Some(&[][..]));
    assert!(recorded.stopped);
}

#[tokio::test(start_paused = true)]
async fn failing_driver_stops_the_runtime() {
    let harness = start(backend()).await;
    harness.recording.fail_renders();
    harness.handle.command(UserCommand::Open(general())).await.unwrap();

    let result = harness.task.await.unwrap();
    assert!(matches!(result, Err(RuntimeError::Driver(_))));
}
