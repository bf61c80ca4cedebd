//! Application layer for Teamdesk
//!
//! Generic async runtime that drives the sync engine, enabling deterministic
//! simulation testing with the same code that runs in production.
//!
//! # Components
//!
//! - [`Backend`]: Trait for the backing service (fetch, mark read, send)
//! - [`Driver`]: Trait for platform-specific output (render, notify, cues)
//! - [`Runtime`]: Generic orchestration loop
//! - [`SystemEnv`]: Production environment on `tokio::time`

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod backend;
mod command;
mod config;
mod driver;
mod runtime;
mod system_env;

pub use backend::Backend;
pub use command::UserCommand;
pub use config::{
    DEFAULT_BACKGROUND_PERIOD, DEFAULT_CHANNEL_CAPACITY, DEFAULT_FOREGROUND_PERIOD, MIN_POLL_PERIOD,
    RuntimeConfig,
};
pub use driver::Driver;
pub use runtime::{Runtime, RuntimeError, RuntimeHandle};
pub use system_env::SystemEnv;
