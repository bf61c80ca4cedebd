//! Generic runtime for sync orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`SyncEngine`]: conversation synchronization state machine
//! - [`Backend`]: calls into the backing service
//! - [`Driver`]: platform-specific output
//!
//! Everything runs on one task. Backend calls are collected in a
//! [`FuturesUnordered`] and polled by the same `tokio::select!` loop that
//! serves user commands, push frames and poll timers, so calls overlap with
//! ticks while every state mutation stays on the loop.

use std::time::Duration;

use futures::{
    StreamExt,
    future::{self, BoxFuture},
    stream::FuturesUnordered,
};
use teamdesk_core::{ConversationKind, ConversationRef, env::Environment};
use teamdesk_sync::{Generation, SyncAction, SyncEngine, SyncEvent};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{self, Interval, MissedTickBehavior},
};

use crate::{Backend, Driver, MIN_POLL_PERIOD, RuntimeConfig, UserCommand};

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The driver failed to render or surface something.
    #[error("driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The runtime is no longer accepting input.
    #[error("runtime stopped")]
    Closed,
}

/// Sending half of the runtime's input channels.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<UserCommand>,
    push: mpsc::Sender<Vec<u8>>,
}

impl RuntimeHandle {
    /// Deliver a user command.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Closed`] if the runtime has stopped.
    pub async fn command(&self, command: UserCommand) -> Result<(), RuntimeError> {
        self.commands.send(command).await.map_err(|_| RuntimeError::Closed)
    }

    /// Deliver a raw push frame.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Closed`] if the runtime has stopped.
    pub async fn push(&self, frame: Vec<u8>) -> Result<(), RuntimeError> {
        self.push.send(frame).await.map_err(|_| RuntimeError::Closed)
    }
}

/// A running poll timer and the generation its ticks carry.
struct PollTimer {
    generation: Generation,
    interval: Interval,
}

impl PollTimer {
    /// First tick fires one full period from now.
    fn new(generation: Generation, period: Duration) -> Self {
        // `interval_at` panics on a zero period.
        let period = period.max(MIN_POLL_PERIOD);
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { generation, interval }
    }
}

/// Wait for the next tick of `timer`, or forever if it is stopped.
async fn next_tick(timer: &mut Option<PollTimer>) -> Generation {
    match timer {
        Some(timer) => {
            timer.interval.tick().await;
            timer.generation
        },
        None => future::pending().await,
    }
}

/// Generic runtime that orchestrates engine, backend and driver.
///
/// # Type Parameters
///
/// - `B`: Backing service
/// - `D`: Platform-specific output driver
/// - `E`: Environment providing time
pub struct Runtime<B, D, E>
where
    B: Backend,
    D: Driver,
    E: Environment,
{
    backend: B,
    driver: D,
    engine: SyncEngine<E>,
    config: RuntimeConfig,
    commands: mpsc::Receiver<UserCommand>,
    push: mpsc::Receiver<Vec<u8>>,
    push_open: bool,
    foreground: Option<PollTimer>,
    background: Option<PollTimer>,
    pending: FuturesUnordered<BoxFuture<'static, SyncEvent>>,
}

impl<B, D, E> Runtime<B, D, E>
where
    B: Backend,
    D: Driver,
    E: Environment,
{
    /// Create a runtime and the handle used to feed it.
    pub fn new(backend: B, driver: D, env: E, config: RuntimeConfig) -> (Self, RuntimeHandle) {
        let (command_tx, commands) = mpsc::channel(config.channel_capacity);
        let (push_tx, push) = mpsc::channel(config.channel_capacity);
        let engine = SyncEngine::new(env, config.sync.clone());

        let runtime = Self {
            backend,
            driver,
            engine,
            config,
            commands,
            push,
            push_open: true,
            foreground: None,
            background: None,
            pending: FuturesUnordered::new(),
        };
        (runtime, RuntimeHandle { commands: command_tx, push: push_tx })
    }

    /// Run the event loop until [`UserCommand::Quit`] or until every
    /// [`RuntimeHandle`] is dropped.
    ///
    /// Starts the session first, which schedules the background poll.
    ///
    /// # Errors
    ///
    /// Returns an error only if the driver fails. Backend failures are
    /// handled by the engine.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        self.dispatch(SyncEvent::SessionStarted)?;
        self.render_timeline()?;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(UserCommand::Quit) | None => break,
                    Some(command) => self.handle_command(command)?,
                },

                frame = self.push.recv(), if self.push_open => match frame {
                    Some(bytes) => self.dispatch(SyncEvent::PushFrame(bytes))?,
                    None => {
                        tracing::warn!("push channel closed, relying on polls");
                        self.push_open = false;
                    },
                },

                generation = next_tick(&mut self.foreground) => {
                    self.dispatch(SyncEvent::ForegroundTick { generation })?;
                },

                generation = next_tick(&mut self.background) => {
                    self.dispatch(SyncEvent::BackgroundTick { generation })?;
                },

                Some(event) = self.pending.next(), if !self.pending.is_empty() => {
                    self.dispatch(event)?;
                },
            }
        }

        tracing::info!(outstanding = self.pending.len(), "runtime stopping");
        self.driver.stop();
        Ok(())
    }

    /// The engine, for inspection.
    pub fn engine(&self) -> &SyncEngine<E> {
        &self.engine
    }

    /// The driver, for inspection.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn handle_command(&mut self, command: UserCommand) -> Result<(), RuntimeError> {
        let event = match command {
            UserCommand::Open(conversation) => SyncEvent::OpenConversation(conversation),
            UserCommand::Close => SyncEvent::CloseConversation,
            UserCommand::Send(draft) => SyncEvent::SendRequested(draft),
            UserCommand::MarkRead => SyncEvent::MarkReadRequested,
            UserCommand::SignIn => SyncEvent::SessionStarted,
            UserCommand::SignOut => SyncEvent::SignedOut,
            UserCommand::ActivateNotification(link) => {
                match ConversationRef::from_deep_link(&link) {
                    Ok(conversation) => SyncEvent::OpenConversation(conversation),
                    Err(err) => {
                        tracing::warn!(%link, error = %err, "ignoring notification with bad link");
                        return Ok(());
                    },
                }
            },
            UserCommand::Quit => return Ok(()),
        };
        self.dispatch(event)
    }

    /// Feed an event to the engine and execute the resulting actions.
    fn dispatch(&mut self, event: SyncEvent) -> Result<(), RuntimeError> {
        for action in self.engine.handle(event) {
            self.execute(action)?;
        }
        Ok(())
    }

    fn execute(&mut self, action: SyncAction) -> Result<(), RuntimeError> {
        match action {
            SyncAction::FetchMessages { conversation, generation, origin } => {
                let backend = self.backend.clone();
                self.pending.push(Box::pin(async move {
                    let result = backend.fetch_messages(&conversation).await;
                    SyncEvent::MessagesFetched { conversation, generation, origin, result }
                }));
            },
            SyncAction::FetchSummaries { generation } => {
                let backend = self.backend.clone();
                self.pending.push(Box::pin(async move {
                    let result = futures::try_join!(
                        backend.fetch_summaries(ConversationKind::Channel),
                        backend.fetch_summaries(ConversationKind::Group),
                        backend.fetch_summaries(ConversationKind::Dm),
                    )
                    .map(|(channels, groups, dms)| {
                        channels.into_iter().chain(groups).chain(dms).collect()
                    });
                    SyncEvent::SummariesFetched { generation, result }
                }));
            },
            SyncAction::MarkRead { conversation, origin } => {
                let backend = self.backend.clone();
                self.pending.push(Box::pin(async move {
                    let result = backend.mark_read(&conversation).await;
                    SyncEvent::MarkReadCompleted { conversation, origin, result }
                }));
            },
            SyncAction::SendMessage { conversation, draft } => {
                let backend = self.backend.clone();
                self.pending.push(Box::pin(async move {
                    let result = backend.send_message(&conversation, &draft).await;
                    SyncEvent::SendCompleted { conversation, draft, result }
                }));
            },

            SyncAction::ScheduleForegroundPoll { generation } => {
                self.foreground = Some(PollTimer::new(generation, self.config.foreground_period));
            },
            SyncAction::CancelForegroundPoll => self.foreground = None,
            SyncAction::ScheduleBackgroundPoll { generation } => {
                self.background = Some(PollTimer::new(generation, self.config.background_period));
            },
            SyncAction::CancelBackgroundPoll => self.background = None,

            SyncAction::TimelineUpdated { .. } | SyncAction::TimelineClosed => {
                self.render_timeline()?;
            },
            SyncAction::SummariesUpdated => {
                let summaries: Vec<_> = self.engine.accountant().summaries().collect();
                self.driver.render_sidebar(&summaries).map_err(driver_error)?;
            },
            SyncAction::Notify(notification) => {
                self.driver.notify(&notification).map_err(driver_error)?;
            },
            SyncAction::PlayCue(cue) => self.driver.play_cue(cue).map_err(driver_error)?,
            SyncAction::ReportError(error) => {
                self.driver.report_error(&error).map_err(driver_error)?;
            },
            SyncAction::RestoreDraft { conversation, draft } => {
                self.driver.restore_draft(&conversation, draft).map_err(driver_error)?;
            },
        }
        Ok(())
    }

    fn render_timeline(&mut self) -> Result<(), RuntimeError> {
        self.driver.render_timeline(self.engine.timeline()).map_err(driver_error)
    }
}

fn driver_error<E>(err: E) -> RuntimeError
where
    E: std::error::Error + Send + Sync + 'static,
{
    RuntimeError::Driver(Box::new(err))
}
