//! Scripted traffic: other users posting and the local user clicking around.

use std::time::Duration;

use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use teamdesk_app::{RuntimeError, RuntimeHandle, UserCommand};
use teamdesk_core::{ConversationRef, MessageDraft, UserId};
use teamdesk_harness::SimBackend;

const PEOPLE: [(&str, &str); 3] = [("ada", "Ada"), ("lin", "Lin"), ("sam", "Sam")];

const LINES: [&str; 6] = [
    "standup in 5",
    "deploy is green",
    "@grace can you take a look?",
    "lunch?",
    "pushed a fix",
    "rolling back",
];

/// Traffic generation knobs.
#[derive(Debug, Clone)]
pub struct TrafficConfig {
    /// RNG seed.
    pub seed: u64,
    /// Mean pause between events.
    pub pace: Duration,
    /// Fraction of posts whose push frame is lost.
    pub push_loss: f64,
}

/// Conversations the simulated workspace starts with.
pub fn conversations() -> Vec<(ConversationRef, &'static str)> {
    vec![
        (ConversationRef::channel("general"), "general"),
        (ConversationRef::channel("incidents"), "incidents"),
        (ConversationRef::group("platform"), "platform"),
        (ConversationRef::dm("ada-grace"), "Ada"),
    ]
}

/// Generate traffic until the runtime stops accepting input.
pub async fn run(
    backend: SimBackend,
    handle: RuntimeHandle,
    config: TrafficConfig,
) -> Result<(), RuntimeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let conversations: Vec<ConversationRef> =
        conversations().into_iter().map(|(conversation, _)| conversation).collect();

    loop {
        let pause = config.pace.mul_f64(rng.gen_range(0.5..1.5));
        tokio::time::sleep(pause).await;

        let Some(conversation) = conversations.choose(&mut rng).cloned() else {
            return Ok(());
        };
        match rng.gen_range(0..10) {
            0 => handle.command(UserCommand::Open(conversation)).await?,
            1 => {
                // The target may live in another conversation; it then renders as an orphan reply.
                let newest = backend.store().message_ids(&conversation).pop();
                let draft = match newest {
                    Some(target) if rng.gen_bool(0.5) => MessageDraft::text("ack").replying_to(target),
                    _ => MessageDraft::text("ack"),
                };
                handle.command(UserCommand::Send(draft)).await?
            },
            2 => handle.command(UserCommand::MarkRead).await?,
            _ => {
                let (id, name) = PEOPLE[rng.gen_range(0..PEOPLE.len())];
                let line = LINES[rng.gen_range(0..LINES.len())];
                let frame = backend.post_frame(&conversation, &UserId::from(id), name, line);
                match frame {
                    Ok(_) if rng.gen_bool(config.push_loss) => {
                        tracing::debug!(%conversation, "push frame lost");
                    },
                    Ok(frame) => handle.push(frame).await?,
                    Err(err) => tracing::warn!(error = %err, "could not encode push frame"),
                }
            },
        }
    }
}
