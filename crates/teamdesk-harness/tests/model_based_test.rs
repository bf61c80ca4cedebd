//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! engine behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelInbox      SimWorld       Compare
//!      (reference)   (SyncEngine)     effects + state
//! ```
//!
//! Only the push channel feeds the engine here; fetches are requested but
//! never completed, so every observable change comes from Event Intake.

#![allow(clippy::unwrap_used)]

use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use teamdesk_core::{ConversationRef, Message, MessageId, RawMessage, UserId};
use teamdesk_harness::{
    Author, MODEL_CONVERSATIONS, ModelInbox, ModelMessage, ObservableInbox, Operation,
    PushEffect, SimWorld, conversation_ref,
};
use teamdesk_sync::SyncAction;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
}

fn arb_author() -> impl Strategy<Value = Author> {
    prop_oneof![
        1 => Just(Author::Local),
        3 => Just(Author::Foreign),
        1 => Just(Author::ForeignMention),
    ]
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        2 => (0..MODEL_CONVERSATIONS).prop_map(|conversation| Operation::Open { conversation }),
        1 => Just(Operation::Close),
        6 => (0..MODEL_CONVERSATIONS, arb_author())
            .prop_map(|(conversation, author)| Operation::Push { conversation, author }),
        2 => Just(Operation::Redeliver),
        1 => (1u16..90).prop_map(|secs| Operation::AdvanceTime { secs }),
    ]
}

/// Real message for a model message.
fn to_raw(message: &ModelMessage) -> RawMessage {
    let (sender, name, content) = match message.author {
        Author::Local => ("me", "Grace", "on it"),
        Author::Foreign => ("ada", "Ada", "status?"),
        Author::ForeignMention => ("ada", "Ada", "@grace please look"),
    };
    RawMessage::from(Message {
        id: message.id.clone(),
        conversation: message.conversation.clone(),
        sender_id: UserId::from(sender),
        sender_name: name.into(),
        content: Some(content.into()),
        attachments: Vec::new(),
        created_at: message.created_at,
        edited_at: None,
        deleted: false,
        reply_to: None,
        read_by: Default::default(),
    })
}

fn observed_effect(actions: &[SyncAction]) -> PushEffect {
    let notifications = actions.iter().filter(|a| matches!(a, SyncAction::Notify(_))).count();
    let cues: Vec<_> = actions
        .iter()
        .filter_map(|a| match a {
            SyncAction::PlayCue(cue) => Some(*cue),
            _ => None,
        })
        .collect();
    assert!(notifications <= 1, "one push raised {notifications} notifications");
    assert!(cues.len() <= 1, "one push played {cues:?}");
    PushEffect { notified: notifications == 1, cue: cues.first().copied() }
}

fn observe_world(world: &SimWorld) -> ObservableInbox {
    let engine = world.engine();
    let unread: BTreeMap<ConversationRef, u32> = engine
        .accountant()
        .summaries()
        .filter(|summary| summary.unread_count > 0)
        .map(|summary| (summary.conversation.clone(), summary.unread_count))
        .collect();
    ObservableInbox {
        open: engine.open_conversation().cloned(),
        timeline: engine
            .timeline()
            .map(|timeline| timeline.messages().iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default(),
        unread,
    }
}

fn run(operations: &[Operation]) -> Result<(), TestCaseError> {
    let mut model = ModelInbox::new();
    let mut world = SimWorld::new(0);
    world.sign_in();
    world.drain_surfaced();
    let mut last: Option<ModelMessage> = None;

    for (step, operation) in operations.iter().enumerate() {
        match operation {
            Operation::Open { conversation } => {
                model.open(conversation_ref(*conversation));
                world.open(&conversation_ref(*conversation));
            },
            Operation::Close => {
                model.close();
                world.handle(teamdesk_sync::SyncEvent::CloseConversation);
            },
            Operation::Push { conversation, author } => {
                let message = ModelMessage {
                    id: MessageId::new(format!("m{step:03}")),
                    conversation: conversation_ref(*conversation),
                    author: *author,
                    created_at: base_time() + chrono::Duration::seconds(i64::try_from(step).unwrap()),
                };
                world.drain_surfaced();
                let expected = model.push(&message);
                world.push(to_raw(&message));
                prop_assert_eq!(observed_effect(&world.drain_surfaced()), expected, "step {}", step);
                last = Some(message);
            },
            Operation::Redeliver => {
                if let Some(ref message) = last {
                    world.drain_surfaced();
                    let expected = model.push(message);
                    world.push(to_raw(message));
                    prop_assert_eq!(
                        observed_effect(&world.drain_surfaced()),
                        expected,
                        "step {} (redelivery)",
                        step
                    );
                }
            },
            Operation::AdvanceTime { secs } => {
                let by = Duration::from_secs(u64::from(*secs));
                model.advance(by);
                world.env().advance(by);
            },
        }

        prop_assert_eq!(observe_world(&world), model.observe(), "after step {}", step);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn engine_matches_model(operations in prop::collection::vec(arb_operation(), 1..60)) {
        run(&operations)?;
    }
}

#[test]
fn redelivery_after_reopen_lands_in_order() {
    let operations = [
        Operation::Open { conversation: 0 },
        Operation::Push { conversation: 0, author: Author::Foreign },
        Operation::Push { conversation: 0, author: Author::Local },
        Operation::Open { conversation: 1 },
        Operation::Open { conversation: 0 },
        Operation::Redeliver,
        Operation::Push { conversation: 0, author: Author::ForeignMention },
    ];
    run(&operations).unwrap();
}

#[test]
fn mention_in_closed_conversation_notifies_and_counts() {
    let operations = [
        Operation::Push { conversation: 2, author: Author::ForeignMention },
        Operation::Redeliver,
        Operation::AdvanceTime { secs: 61 },
        Operation::Redeliver,
    ];
    run(&operations).unwrap();
}
