//! Poll scheduling state.
//!
//! The scheduler owns no clocks. It hands out a [`Generation`] every time a
//! timer is (re)started, and every tick or fetch result must present the
//! generation it was issued under. Anything older is stale and ignored, so a
//! tick that fires after its timer was cancelled is harmless even if the
//! cancellation raced with it.
//!
//! Each timer also carries an in-flight flag. A tick that arrives while the
//! previous cycle's fetch is outstanding is dropped, not queued.

use teamdesk_core::ConversationRef;

/// Identifies one scheduling of a poll timer. Monotonically increasing.
pub type Generation = u64;

/// Why a tick did not start a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRejection {
    /// The tick belongs to a cancelled or replaced timer.
    Stale,
    /// The previous cycle is still in flight.
    InFlight,
}

#[derive(Debug, Clone)]
struct ForegroundPoll {
    conversation: ConversationRef,
    generation: Generation,
    in_flight: bool,
}

#[derive(Debug, Clone, Copy)]
struct BackgroundPoll {
    generation: Generation,
    in_flight: bool,
}

/// Foreground and background poll bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct PollScheduler {
    foreground: Option<ForegroundPoll>,
    foreground_generation: Generation,
    background: Option<BackgroundPoll>,
    background_generation: Generation,
}

impl PollScheduler {
    /// Create a scheduler with both timers stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling `conversation`, replacing any previous foreground poll.
    pub fn start_foreground(&mut self, conversation: ConversationRef) -> Generation {
        self.foreground_generation += 1;
        let generation = self.foreground_generation;
        self.foreground = Some(ForegroundPoll { conversation, generation, in_flight: false });
        generation
    }

    /// Stop the foreground poll. Returns `true` if one was running.
    pub fn stop_foreground(&mut self) -> bool {
        self.foreground.take().is_some()
    }

    /// Begin a foreground cycle for a tick of `generation`.
    ///
    /// On success the cycle is marked in flight and the conversation to
    /// fetch is returned.
    pub fn begin_foreground(
        &mut self,
        generation: Generation,
    ) -> Result<ConversationRef, TickRejection> {
        let poll = self
            .foreground
            .as_mut()
            .filter(|poll| poll.generation == generation)
            .ok_or(TickRejection::Stale)?;

        if poll.in_flight {
            return Err(TickRejection::InFlight);
        }
        poll.in_flight = true;
        Ok(poll.conversation.clone())
    }

    /// Finish the foreground cycle issued under `generation`.
    ///
    /// Clears the in-flight flag and returns `true` if the cycle still
    /// belongs to the running poll of `conversation`. A `false` result means
    /// the fetch result must be discarded.
    pub fn finish_foreground(
        &mut self,
        generation: Generation,
        conversation: &ConversationRef,
    ) -> bool {
        match self.foreground.as_mut() {
            Some(poll) if poll.generation == generation && &poll.conversation == conversation => {
                poll.in_flight = false;
                true
            },
            _ => false,
        }
    }

    /// Conversation being polled, if any.
    pub fn foreground_conversation(&self) -> Option<&ConversationRef> {
        self.foreground.as_ref().map(|poll| &poll.conversation)
    }

    /// Whether a foreground cycle is in flight.
    pub fn foreground_in_flight(&self) -> bool {
        self.foreground.as_ref().is_some_and(|poll| poll.in_flight)
    }

    /// Start the background poll, replacing any previous one.
    pub fn start_background(&mut self) -> Generation {
        self.background_generation += 1;
        let generation = self.background_generation;
        self.background = Some(BackgroundPoll { generation, in_flight: false });
        generation
    }

    /// Stop the background poll. Returns `true` if one was running.
    pub fn stop_background(&mut self) -> bool {
        self.background.take().is_some()
    }

    /// Begin a background cycle for a tick of `generation`.
    pub fn begin_background(&mut self, generation: Generation) -> Result<(), TickRejection> {
        let poll = self
            .background
            .as_mut()
            .filter(|poll| poll.generation == generation)
            .ok_or(TickRejection::Stale)?;

        if poll.in_flight {
            return Err(TickRejection::InFlight);
        }
        poll.in_flight = true;
        Ok(())
    }

    /// Finish the background cycle issued under `generation`.
    ///
    /// Returns `true` if the result should be applied.
    pub fn finish_background(&mut self, generation: Generation) -> bool {
        match self.background.as_mut() {
            Some(poll) if poll.generation == generation => {
                poll.in_flight = false;
                true
            },
            _ => false,
        }
    }

    /// Whether the background poll is running.
    pub fn background_active(&self) -> bool {
        self.background.is_some()
    }

    /// Whether a background cycle is in flight.
    pub fn background_in_flight(&self) -> bool {
        self.background.is_some_and(|poll| poll.in_flight)
    }
}
