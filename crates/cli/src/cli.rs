// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use bz_core::Choice;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Which version wins a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChoiceArg {
    Local,
    Server,
}

impl From<ChoiceArg> for Choice {
    fn from(arg: ChoiceArg) -> Self {
        match arg {
            ChoiceArg::Local => Choice::Local,
            ChoiceArg::Server => Choice::Server,
        }
    }
}

/// Queue item status filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Syncing,
    Failed,
}

// Custom help template that groups commands into sections
const HELP_TEMPLATE: &str = "{about-with-newline}
{usage-heading} {usage}

{before-help}Options:
{options}{after-help}";

const COMMANDS_HELP: &str = "\
Offline Queue:
  status      Show connectivity, queue and conflict summary
  queue       Inspect and manage queued mutations
  conflicts   List and resolve version conflicts
  sync        Deliver queued mutations now

Network:
  fetch       Send an HTTP request through the cache strategies
  chat        Open a live chat session

Background:
  daemon      Manage the background daemon (bazaard)
  completion  Generate shell completions";

const QUICKSTART_HELP: &str = "\
Get started:
  bazaar daemon start              Start background sync and caching
  bazaar fetch /api/listings       Read through the cache
  bazaar queue list                Show pending mutations
  bazaar sync                      Deliver them now";

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(about = "Offline-resilient client for the marketplace API")]
#[command(
    long_about = "Offline-resilient client for the marketplace API.\n\n\
    Mutations made while offline are queued durably and delivered when connectivity returns."
)]
#[command(help_template = HELP_TEMPLATE)]
#[command(before_help = COMMANDS_HELP)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// State directory (default: $BAZAAR_STATE_DIR or ~/.local/state/bazaar)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show connectivity, queue and conflict summary
    Status {
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Inspect and manage queued mutations
    #[command(subcommand)]
    Queue(QueueCommand),

    /// List and resolve version conflicts
    #[command(subcommand)]
    Conflicts(ConflictsCommand),

    /// Deliver queued mutations now
    #[command(after_help = "Examples:\n  \
        bazaar sync            Ask the daemon, or drain locally if it is not running\n  \
        bazaar sync --local    Always drain in this process")]
    Sync {
        /// Drain in this process even if the daemon is running
        #[arg(long)]
        local: bool,
    },

    /// Send an HTTP request through the cache strategies
    #[command(
        arg_required_else_help = true,
        after_help = "Examples:\n  \
        bazaar fetch /api/listings\n  \
        bazaar fetch -X POST /api/offers -d '{\"amount\":40}'"
    )]
    Fetch {
        /// URL or path relative to server.api_url
        url: String,

        /// HTTP method
        #[arg(long = "method", short = 'X', default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(long, short)]
        data: Option<String>,
    },

    /// Open a live chat session (lines on stdin are sent)
    #[command(arg_required_else_help = true)]
    Chat {
        /// Conversation id
        conversation: String,
    },

    /// Manage the background daemon
    #[command(subcommand)]
    Daemon(DaemonCommand),

    /// Generate shell completions
    #[command(
        arg_required_else_help = true,
        after_help = "Examples:\n  \
        bazaar completion bash > ~/.local/share/bash-completion/completions/bazaar\n  \
        bazaar completion zsh > ~/.zfunc/_bazaar\n  \
        bazaar completion fish > ~/.config/fish/completions/bazaar.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Sync queue commands.
#[derive(Subcommand)]
pub enum QueueCommand {
    /// List queued mutations in processing order
    List {
        /// Only items with this status
        #[arg(long, short, value_enum)]
        status: Option<StatusArg>,

        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Queue a mutation by hand
    #[command(
        arg_required_else_help = true,
        after_help = "Examples:\n  \
        bazaar queue add listing.update '{\"entityType\":\"listing\",\"entityId\":\"l-1\",\"fields\":{\"price\":40}}'\n  \
        bazaar queue add offer.create '{\"amount\":40}' -p 1"
    )]
    Add {
        /// Mutation type, e.g. listing.update
        kind: String,

        /// JSON object payload
        payload: String,

        /// Priority, 1 (critical) to 10 (bulk)
        #[arg(long, short, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=10))]
        priority: u8,
    },

    /// Return failed items to pending with a fresh retry budget
    RetryFailed,

    /// Delete every failed item
    ClearFailed,

    /// Move a pending item to critical priority
    #[command(arg_required_else_help = true)]
    Promote {
        /// Queue item id
        id: String,
    },

    /// Delete an item
    #[command(arg_required_else_help = true)]
    Delete {
        /// Queue item id
        id: String,
    },
}

/// Conflict commands.
#[derive(Subcommand)]
pub enum ConflictsCommand {
    /// List pending conflicts
    List {
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Resolve a conflict by keeping one whole version
    #[command(
        arg_required_else_help = true,
        after_help = "Examples:\n  \
        bazaar conflicts resolve c-1 --use server   Accept the server version\n  \
        bazaar conflicts resolve c-1 --use local    Keep local edits and re-send them"
    )]
    Resolve {
        /// Conflict id
        id: String,

        /// Version to keep
        #[arg(long = "use", value_enum)]
        choice: ChoiceArg,
    },

    /// Show the resolution audit log
    History {
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },
}

/// Daemon management commands.
#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon
    Start,
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
    /// Print daemon notices as they arrive
    Watch,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
