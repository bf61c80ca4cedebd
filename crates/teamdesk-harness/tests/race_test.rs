//! Push/poll race tests on the synchronous world.
//!
//! Backend calls are completed by hand, in whatever order reproduces the race.
//! [`SimWorld`] checks the standard invariants after every engine step, so
//! each test also asserts that no intermediate state was ever inconsistent.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use teamdesk_core::{ConversationRef, MessageId, UserId};
use teamdesk_harness::SimWorld;
use teamdesk_sync::{Cue, SyncAction, SyncError};

fn general() -> ConversationRef {
    ConversationRef::channel("general")
}

fn ops() -> ConversationRef {
    ConversationRef::group("ops")
}

fn dm() -> ConversationRef {
    ConversationRef::dm("ada-grace")
}

fn ids(world: &SimWorld) -> Vec<MessageId> {
    world
        .engine()
        .timeline()
        .map(|timeline| timeline.messages().iter().map(|m| m.id.clone()).collect())
        .unwrap_or_default()
}

/// Complete the outstanding call for `conversation`.
fn deliver_for(world: &mut SimWorld, conversation: &ConversationRef) {
    let index = world
        .pending()
        .iter()
        .position(|call| call.conversation() == Some(conversation))
        .unwrap();
    world.deliver(index);
}

#[test]
fn snapshot_for_previous_conversation_is_discarded() {
    let mut world = SimWorld::new(0);
    world.post(&general(), "ada", "in general");
    world.post(&ops(), "lin", "in ops");
    world.sign_in();

    world.open(&general());
    world.open(&ops());
    deliver_for(&mut world, &general());

    assert_eq!(world.engine().open_conversation(), Some(&ops()));
    assert!(ids(&world).is_empty());

    deliver_for(&mut world, &ops());
    assert_eq!(ids(&world), world.store().message_ids(&ops()));
}

#[test]
fn push_that_lands_during_the_load_survives_it() {
    let mut world = SimWorld::new(0);
    world.post(&general(), "ada", "first");
    world.sign_in();
    world.open(&general());

    // Persisted right after the service produced the snapshot.
    let mut later = world.store().clone();
    let pushed = later.post(&general(), &UserId::from("lin"), "lin", "second");
    world.push(pushed.clone());
    deliver_for(&mut world, &general());
    *world.store_mut() = later;

    let shown = ids(&world);
    assert_eq!(shown.len(), 2);
    assert_eq!(shown.last().map(MessageId::as_str), pushed.id.as_deref());

    world.settle();
    assert_eq!(world.check_convergence(), Ok(()));
}

#[test]
fn only_one_foreground_fetch_is_ever_outstanding() {
    let mut world = SimWorld::new(0);
    world.sign_in();
    world.open(&general());
    world.fire_foreground();
    world.fire_foreground();

    let fetches = world
        .pending()
        .iter()
        .filter(|call| matches!(call.action(), SyncAction::FetchMessages { .. }))
        .count();
    assert_eq!(fetches, 1);
}

#[test]
fn poll_widens_receipts_and_applies_edits_and_deletions() {
    let mut world = SimWorld::new(0);
    world.sign_in();
    world.open(&general());
    world.deliver_all();

    world.send("draft plan");
    world.deliver_all();
    let sent = world.post(&general(), "ada", "looks good");

    let mine = world.store().message_ids(&general())[0].clone();
    world.store_mut().add_reader(&general(), &UserId::from("ada"));
    world.store_mut().edit(&general(), &mine, "final plan");
    world.store_mut().delete(&general(), &MessageId::new(sent.id.clone().unwrap()));
    world.fire_foreground();
    world.deliver_all();

    let timeline = world.engine().timeline().unwrap();
    let own = timeline.get(&mine).unwrap();
    assert!(own.read_by.contains(&UserId::from("ada")));
    assert_eq!(own.content.as_deref(), Some("final plan"));
    assert!(own.edited_at.is_some());
    assert!(timeline.get(&MessageId::new(sent.id.unwrap())).unwrap().deleted);
}

#[test]
fn opening_a_conversation_commits_the_read_receipt() {
    let mut world = SimWorld::new(0);
    world.post(&dm(), "ada", "ping");
    world.sign_in();
    world.deliver_all();
    assert_eq!(world.engine().accountant().unread_count(&dm()), 1);

    world.open(&dm());
    assert_eq!(world.engine().accountant().unread_count(&dm()), 0);
    world.deliver_all();

    assert_eq!(world.store().unread_count(&dm()), 0);
    let timeline = world.engine().timeline().unwrap();
    assert!(timeline.messages().iter().all(|m| m.read_by.contains(&UserId::from("me"))));
}

#[test]
fn switch_failure_is_reported_and_the_next_poll_recovers() {
    let mut world = SimWorld::new(0);
    world.post(&general(), "ada", "hello");
    world.sign_in();
    world.deliver_all();
    world.drain_surfaced();

    world.set_failure_rate(1.0);
    world.open(&general());
    world.deliver_all();
    assert!(world.drain_surfaced().iter().any(|action| matches!(
        action,
        SyncAction::ReportError(SyncError::SwitchFailed { .. })
    )));

    world.set_failure_rate(0.0);
    world.fire_foreground();
    world.deliver_all();
    assert_eq!(ids(&world), world.store().message_ids(&general()));
    assert!(world.engine().is_loaded());
}

#[test]
fn send_result_and_push_echo_produce_one_entry_and_one_cue() {
    let mut world = SimWorld::new(0);
    world.sign_in();
    world.open(&general());
    world.deliver_all();
    world.drain_surfaced();

    world.send("on my way");
    let index = world.pending().len() - 1;
    let echo = {
        let mut later = world.store().clone();
        later.send(&general(), &teamdesk_core::MessageDraft::text("on my way"))
    };
    world.push(echo);
    world.deliver(index);

    let cues: Vec<_> = world
        .drain_surfaced()
        .into_iter()
        .filter_map(|action| match action {
            SyncAction::PlayCue(cue) => Some(cue),
            _ => None,
        })
        .collect();
    assert_eq!(cues, [Cue::Sent]);
    assert_eq!(ids(&world).len(), 1);
}

#[derive(Debug, Clone)]
enum Step {
    Post { conversation: u8, push: bool },
    Open(u8),
    Close,
    Send,
    Revise { conversation: u8, pick: usize, delete: bool },
    Read { conversation: u8 },
    Foreground,
    Background,
    Deliver(usize),
    MarkRead,
}

fn conversation(index: u8) -> ConversationRef {
    match index % 3 {
        0 => general(),
        1 => ops(),
        _ => dm(),
    }
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0u8..3, any::<bool>()).prop_map(|(conversation, push)| Step::Post { conversation, push }),
        2 => (0u8..3).prop_map(Step::Open),
        1 => Just(Step::Close),
        1 => Just(Step::Send),
        2 => (0u8..3, any::<usize>(), any::<bool>())
            .prop_map(|(conversation, pick, delete)| Step::Revise { conversation, pick, delete }),
        1 => (0u8..3).prop_map(|conversation| Step::Read { conversation }),
        2 => Just(Step::Foreground),
        2 => Just(Step::Background),
        5 => any::<usize>().prop_map(Step::Deliver),
        1 => Just(Step::MarkRead),
    ]
}

fn pick(world: &SimWorld, conversation: &ConversationRef, pick: usize) -> Option<MessageId> {
    let ids = world.store().message_ids(conversation);
    (!ids.is_empty()).then(|| ids[pick % ids.len()].clone())
}

fn apply(world: &mut SimWorld, step: &Step) {
    match *step {
        Step::Post { conversation: index, push } => {
            let target = conversation(index);
            if push {
                world.post_and_push(&target, "ada", "update");
            } else {
                world.post(&target, "lin", "quiet update");
            }
        },
        Step::Open(index) => world.open(&conversation(index)),
        Step::Close => world.handle(teamdesk_sync::SyncEvent::CloseConversation),
        Step::Send => world.send("reply"),
        Step::Revise { conversation: index, pick: n, delete } => {
            let target = conversation(index);
            if let Some(id) = pick(world, &target, n) {
                if delete {
                    world.store_mut().delete(&target, &id);
                } else {
                    world.store_mut().edit(&target, &id, "edited");
                }
            }
        },
        Step::Read { conversation: index } => {
            world.store_mut().add_reader(&conversation(index), &UserId::from("ada"));
        },
        Step::Foreground => {
            world.fire_foreground();
        },
        Step::Background => {
            world.fire_background();
        },
        Step::Deliver(n) => {
            let len = world.pending().len();
            if len > 0 {
                world.deliver(n % len);
            }
        },
        Step::MarkRead => world.handle(teamdesk_sync::SyncEvent::MarkReadRequested),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Whatever the interleaving and however many calls fail, one quiet
    /// foreground and background cycle brings the engine in line with the
    /// service.
    #[test]
    fn any_interleaving_converges(
        seed in any::<u64>(),
        failure_rate in prop_oneof![Just(0.0), Just(0.2), Just(0.5)],
        steps in prop::collection::vec(arb_step(), 1..80),
    ) {
        let mut world = SimWorld::new(seed);
        world.sign_in();
        world.set_failure_rate(failure_rate);

        for step in &steps {
            apply(&mut world, step);
        }

        world.settle();
        prop_assert_eq!(world.check_convergence(), Ok(()));
    }
}
