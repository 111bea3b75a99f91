// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the bzrs library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("queue item not found: {0}\n  hint: run 'bazaar queue list' to see queued items")]
    ItemNotFound(String),

    #[error("conflict not found: {0}\n  hint: run 'bazaar conflicts list' to see pending conflicts")]
    ConflictNotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid payload: {reason}\n  hint: payloads are JSON objects, e.g. '{{\"entityType\":\"listing\",\"entityId\":\"l-1\",\"fields\":{{}}}}'")]
    InvalidPayload { reason: String },

    #[error("authentication failed: the server rejected the credentials\n  hint: update server.auth_token in config.toml or set BAZAAR_AUTH_TOKEN")]
    AuthenticationFailed,

    #[error("could not reach {url} after {attempts} attempts")]
    ReconnectExhausted { url: String, attempts: u32 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("store error: {0}")]
    Store(bz_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("daemon error: {0}")]
    Daemon(String),

    #[error("daemon is not running\n  hint: start it with 'bazaar daemon start'")]
    DaemonNotRunning,

    #[error("daemon version mismatch: daemon is v{daemon_version}, CLI is v{cli_version}\n  hint: restart it with 'bazaar daemon stop && bazaar daemon start'")]
    DaemonVersionMismatch {
        daemon_version: String,
        cli_version: String,
    },
}

/// A specialized Result type for bzrs operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<bz_core::Error> for Error {
    fn from(e: bz_core::Error) -> Self {
        match e {
            bz_core::Error::ItemNotFound(id) => Error::ItemNotFound(id),
            bz_core::Error::ConflictNotFound(id) => Error::ConflictNotFound(id),
            bz_core::Error::Config(msg) => Error::Config(msg),
            bz_core::Error::Io(e) => Error::Io(e),
            bz_core::Error::Json(e) => Error::Json(e),
            e @ (bz_core::Error::InvalidItemState { .. }
            | bz_core::Error::InvalidStatus(_)
            | bz_core::Error::InvalidPriority(_)) => Error::InvalidInput(e.to_string()),
            other => Error::Store(other),
        }
    }
}

impl From<bz_core::ApiError> for Error {
    fn from(e: bz_core::ApiError) -> Self {
        match e {
            bz_core::ApiError::Transport(reason) => Error::Request(reason),
            bz_core::ApiError::InvalidRequest(reason) => Error::InvalidInput(reason),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
