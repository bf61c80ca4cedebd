//! Teamdesk simulation binary.
//!
//! Runs the real sync runtime against an in-memory service while scripted
//! users post messages, some of whose push frames are lost, so the poll
//! backstop has something to catch.
//!
//! # Usage
//!
//! ```bash
//! # One minute with the default 15 s / 30 s polls
//! teamdesk-sim
//!
//! # Fast polls, lossy push channel, flaky service
//! teamdesk-sim --foreground-secs 2 --background-secs 5 --push-loss 0.5 --failure-rate 0.1
//! ```

mod driver;
mod traffic;

use std::time::Duration;

use clap::Parser;
use teamdesk_app::{Runtime, RuntimeConfig, SystemEnv, UserCommand};
use teamdesk_core::{LocalUser, UserId};
use teamdesk_harness::SimBackend;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{driver::TracingDriver, traffic::TrafficConfig};

/// Teamdesk sync simulation
#[derive(Parser, Debug)]
#[command(name = "teamdesk-sim")]
#[command(about = "Run the conversation sync engine against a simulated service")]
#[command(version)]
struct Args {
    /// Local user id
    #[arg(long, default_value = "grace")]
    user: String,

    /// Local user display name (used for mention detection)
    #[arg(long, default_value = "Grace")]
    display_name: String,

    /// Foreground poll period in seconds
    #[arg(long, default_value = "15")]
    foreground_secs: u64,

    /// Background poll period in seconds
    #[arg(long, default_value = "30")]
    background_secs: u64,

    /// How long to run, in seconds
    #[arg(long, default_value = "60")]
    duration_secs: u64,

    /// Mean pause between scripted events, in milliseconds
    #[arg(long, default_value = "1500")]
    pace_ms: u64,

    /// Fraction of push frames that are lost
    #[arg(long, default_value = "0.2")]
    push_loss: f64,

    /// Fraction of backend calls that fail
    #[arg(long, default_value = "0.0")]
    failure_rate: f64,

    /// Seed for traffic and failure injection
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let local = LocalUser::new(args.user.as_str(), args.display_name.as_str());
    tracing::info!(user = %local.id, "teamdesk simulation starting");

    let backend = SimBackend::new(UserId::new(args.user.as_str()), &args.display_name)
        .with_failure_rate(args.seed, args.failure_rate);
    for (conversation, name) in traffic::conversations() {
        backend.store().add_conversation(conversation, name);
    }

    let mut config = RuntimeConfig::new(local);
    config.foreground_period = Duration::from_secs(args.foreground_secs.max(1));
    config.background_period = Duration::from_secs(args.background_secs.max(1));

    let (runtime, handle) =
        Runtime::new(backend.clone(), TracingDriver::new(), SystemEnv::new(), config);
    let runtime = tokio::spawn(runtime.run());

    let traffic = tokio::spawn(traffic::run(
        backend.clone(),
        handle.clone(),
        TrafficConfig {
            seed: args.seed,
            pace: Duration::from_millis(args.pace_ms.max(10)),
            push_loss: args.push_loss.clamp(0.0, 1.0),
        },
    ));

    tokio::time::sleep(Duration::from_secs(args.duration_secs)).await;
    handle.command(UserCommand::Quit).await?;
    runtime.await??;
    traffic.abort();

    let calls = backend.calls();
    tracing::info!(
        fetch_messages = calls.fetch_messages,
        fetch_summaries = calls.fetch_summaries,
        mark_read = calls.mark_read,
        send_message = calls.send_message,
        "simulation finished"
    );
    Ok(())
}
