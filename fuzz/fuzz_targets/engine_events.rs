//! Fuzz target for the sync engine under arbitrary interleavings
//!
//! Drives [`SimWorld`] with an arbitrary mix of user intents, server-side
//! traffic, poll ticks, out-of-order call completions and raw push frames.
//!
//! # Strategy
//!
//! - Reordering: pending backend calls complete in fuzzer-chosen order
//! - Faults: a fuzzer-chosen share of calls fail
//! - Garbage: raw frames go through the real push decoder
//! - Revisions: edits, tombstones and new readers appear on the server
//!
//! # Invariants
//!
//! - Every standard invariant holds after every engine step (checked by the
//!   world itself)
//! - One quiet foreground and background cycle converges on the server,
//!   unless a raw frame smuggled in a message the server never stored
//! - NEVER panic outside an invariant violation

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use teamdesk_core::{ConversationRef, MessageId, PushEvent, UserId};
use teamdesk_harness::SimWorld;
use teamdesk_sync::SyncEvent;

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    failure_percent: u8,
    ops: Vec<Op>,
}

#[derive(Debug, Arbitrary)]
enum Op {
    Post { conversation: u8, push: bool },
    Open(u8),
    Close,
    Send { blank: bool },
    Edit { conversation: u8, pick: u16 },
    Delete { conversation: u8, pick: u16 },
    Read { conversation: u8 },
    Foreground,
    Background,
    Deliver(u16),
    MarkRead,
    Frame(Vec<u8>),
    SignOut,
    SignIn,
}

fn conversation(index: u8) -> ConversationRef {
    match index % 3 {
        0 => ConversationRef::channel("general"),
        1 => ConversationRef::group("ops"),
        _ => ConversationRef::dm("ada-grace"),
    }
}

fn pick(world: &SimWorld, conversation: &ConversationRef, pick: u16) -> Option<MessageId> {
    let ids = world.store().message_ids(conversation);
    (!ids.is_empty()).then(|| ids[usize::from(pick) % ids.len()].clone())
}

fuzz_target!(|scenario: Scenario| {
    let mut world = SimWorld::new(scenario.seed);
    world.sign_in();
    world.set_failure_rate(f64::from(scenario.failure_percent % 101) / 100.0);

    let mut signed_in = true;
    // A frame that decodes may name messages the server never stored.
    let mut forged = false;
    for op in scenario.ops.into_iter().take(256) {
        match op {
            Op::Post { conversation: index, push } => {
                let target = conversation(index);
                if push {
                    world.post_and_push(&target, "ada", "@Grace ping");
                } else {
                    world.post(&target, "lin", "quiet");
                }
            },
            Op::Open(index) => world.open(&conversation(index)),
            Op::Close => world.handle(SyncEvent::CloseConversation),
            Op::Send { blank } => world.send(if blank { "   " } else { "reply" }),
            Op::Edit { conversation: index, pick: n } => {
                let target = conversation(index);
                if let Some(id) = pick(&world, &target, n) {
                    world.store_mut().edit(&target, &id, "edited");
                }
            },
            Op::Delete { conversation: index, pick: n } => {
                let target = conversation(index);
                if let Some(id) = pick(&world, &target, n) {
                    world.store_mut().delete(&target, &id);
                }
            },
            Op::Read { conversation: index } => {
                world.store_mut().add_reader(&conversation(index), &UserId::from("ada"));
            },
            Op::Foreground => {
                world.fire_foreground();
            },
            Op::Background => {
                world.fire_background();
            },
            Op::Deliver(n) => {
                let len = world.pending().len();
                if len > 0 {
                    world.deliver(usize::from(n) % len);
                }
            },
            Op::MarkRead => world.handle(SyncEvent::MarkReadRequested),
            Op::Frame(bytes) => {
                forged |= PushEvent::decode(&bytes).is_ok();
                world.handle(SyncEvent::PushFrame(bytes));
            },
            Op::SignOut => {
                world.handle(SyncEvent::SignedOut);
                signed_in = false;
            },
            Op::SignIn => {
                world.sign_in();
                signed_in = true;
            },
        }
    }

    if signed_in && !forged {
        world.settle();
        if let Err(divergence) = world.check_convergence() {
            panic!("engine diverged from the server: {divergence}");
        }
    }
});
