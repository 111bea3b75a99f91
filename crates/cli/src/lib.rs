// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bzrs - offline-resilient client for the marketplace API.
//!
//! This crate provides the functionality behind the `bazaar` CLI: the
//! real-time channel with its connection manager, and the commands that
//! inspect and drive the durable sync queue shared with the `bazaard` daemon.
//!
//! # Main Components
//!
//! - [`sync::SyncClient`] - live channel plus durable queue fallback
//! - [`sync::ConnectionManager`] - heartbeat, reconnect, outbox and batching
//! - [`Config`] - state directory and settings resolution
//! - [`Error`] - error types for all operations
//!
//! ```rust,ignore
//! use bzrs::sync::{ConnectionManager, SyncClient, WebSocketTransport};
//! use bzrs::Config;
//!
//! let config = Config::load(None)?;
//! let connection = ConnectionManager::spawn(config.connection_config(), WebSocketTransport::new());
//! let client = SyncClient::new(connection, Arc::new(config.open_queue()?));
//! client.connection().connect();
//! client.send_chat("c-1", "is the lamp still available?")?;
//! ```

mod cli;
mod commands;
mod daemon;
mod display;
mod env;

pub mod config;
pub mod error;
pub mod sync;

pub use cli::{
    ChoiceArg, Cli, Command, ConflictsCommand, DaemonCommand, OutputFormat, QueueCommand,
    StatusArg,
};
pub use config::Config;
pub use error::{Error, Result};

use clap::CommandFactory;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber when `RUST_LOG` is set. Silent otherwise.
pub fn init_logging() {
    if !env::log_requested() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Execute a CLI invocation. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(cli: Cli) -> Result<()> {
    if let Command::Completion { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "bazaar", &mut std::io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.state_dir.as_deref())?;
    match cli.command {
        Command::Status { output } => commands::status::run(&config, output),
        Command::Queue(cmd) => commands::queue::run(&config, cmd),
        Command::Conflicts(cmd) => commands::conflicts::run(&config, cmd),
        Command::Sync { local } => commands::sync::run(&config, local),
        Command::Fetch { url, method, data } => {
            commands::fetch::run(&config, &url, &method, data.as_deref())
        }
        Command::Chat { conversation } => commands::chat::run(&config, &conversation),
        Command::Daemon(cmd) => commands::daemon::run(&config, cmd),
        Command::Completion { .. } => Ok(()),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
