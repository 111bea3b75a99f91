// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for bz-core operations.
//!
//! [`Error`] is what fallible store and queue operations return.
//! [`ErrorClass`] is the coarse taxonomy the rest of the system uses to decide
//! whether a failure is recovered locally or surfaced to the user.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All possible errors that can occur in bz-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("queue item not found: {0}")]
    ItemNotFound(String),

    #[error("queue item {id} is {status}\n  hint: only {expected} items can be {action}")]
    InvalidItemState {
        id: String,
        status: String,
        expected: &'static str,
        action: &'static str,
    },

    #[error("invalid queue status: {0}\n  hint: valid statuses are: pending, syncing, synced, failed")]
    InvalidStatus(String),

    #[error("invalid priority: {0}\n  hint: priority must be between 1 (critical) and 10 (bulk)")]
    InvalidPriority(u8),

    #[error("conflict not found: {0}")]
    ConflictNotFound(String),

    #[error("unsupported store schema version {found} (this build supports up to {supported})")]
    SchemaVersion { found: i64, supported: i64 },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// The taxonomy bucket this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::ConflictNotFound(_) => ErrorClass::Conflict,
            _ => ErrorClass::Persistence,
        }
    }
}

/// A specialized Result type for bz-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure taxonomy shared by the foreground and background contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Send or connect failures. Retried via backoff.
    Transport,
    /// Malformed frame. Dropped and logged.
    Protocol,
    /// Terminal close code. Requires a credential refresh.
    Authentication,
    /// Queue overflow. Oldest entry dropped.
    Capacity,
    /// Store read/write failure.
    Persistence,
    /// Version divergence awaiting resolution.
    Conflict,
    /// Per-item retries exhausted. Requires an explicit retry.
    RetryExhausted,
}

impl ErrorClass {
    /// Returns the string representation used in logs and IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transport => "transport",
            ErrorClass::Protocol => "protocol",
            ErrorClass::Authentication => "authentication",
            ErrorClass::Capacity => "capacity",
            ErrorClass::Persistence => "persistence",
            ErrorClass::Conflict => "conflict",
            ErrorClass::RetryExhausted => "retry_exhausted",
        }
    }

    /// Terminal classes need user action; the rest recover on their own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErrorClass::Authentication | ErrorClass::RetryExhausted)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory error state published to observers instead of being returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub class: ErrorClass,
    pub message: String,
}

impl Advisory {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Advisory {
            class,
            message: message.into(),
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
