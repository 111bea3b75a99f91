// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue items: durable records of mutations awaiting delivery.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Highest priority. Processed before anything else.
pub const PRIORITY_CRITICAL: u8 = 1;
/// Default priority for user-initiated mutations.
pub const PRIORITY_NORMAL: u8 = 5;
/// Lowest priority.
pub const PRIORITY_BULK: u8 = 10;

/// Default per-item retry ceiling.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base of the per-item retry delay.
const RETRY_BASE_MS: u64 = 1_000;
/// Ceiling of the per-item retry delay.
const RETRY_CAP_MS: u64 = 30_000;

/// Lifecycle status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for a processing pass.
    Pending,
    /// Claimed by a pass; delivery in flight.
    Syncing,
    /// Delivered and acknowledged.
    Synced,
    /// Retries exhausted. Needs a manual retry.
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Syncing => "syncing",
            QueueStatus::Synced => "synced",
            QueueStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(QueueStatus::Pending),
            "syncing" => Ok(QueueStatus::Syncing),
            "synced" => Ok(QueueStatus::Synced),
            "failed" => Ok(QueueStatus::Failed),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// Validates a priority value.
pub fn validate_priority(priority: u8) -> Result<u8> {
    if (PRIORITY_CRITICAL..=PRIORITY_BULK).contains(&priority) {
        Ok(priority)
    } else {
        Err(Error::InvalidPriority(priority))
    }
}

/// Delay before the next attempt after `retry_count` failures.
///
/// `min(1000 * 2^retry_count, 30000)` milliseconds.
pub fn retry_delay_ms(retry_count: u32) -> u64 {
    let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
    RETRY_BASE_MS.saturating_mul(factor).min(RETRY_CAP_MS)
}

/// Identity of a server-side entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityKey {
    pub entity_type: String,
    pub entity_id: String,
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Payload shape of entity mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Mutation {
    pub fn key(&self) -> EntityKey {
        EntityKey {
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
        }
    }
}

/// A persisted mutation waiting to be synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    /// Mutation kind, e.g. `listing.update`. Names the sync endpoint.
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub priority: u8,
    pub status: QueueStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueItem {
    /// Creates a new pending item with a fresh id.
    pub fn new(kind: impl Into<String>, payload: Value, priority: u8, created_at: u64) -> Self {
        QueueItem {
            id: format!("q-{}", uuid::Uuid::new_v4().simple()),
            kind: kind.into(),
            payload,
            priority,
            status: QueueStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at,
            last_attempt: None,
            next_retry: None,
            error: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// True when the item may be attempted at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        if self.status != QueueStatus::Pending {
            return false;
        }
        match self.next_retry {
            Some(at) => at <= now,
            None => true,
        }
    }

    /// The entity this item mutates, if the payload is an entity mutation.
    pub fn mutation(&self) -> Option<Mutation> {
        serde_json::from_value(self.payload.clone()).ok()
    }

    /// Records a failed attempt.
    ///
    /// Increments `retry_count` (never past `max_retries`). At the ceiling the
    /// item becomes `failed` with no `next_retry`; otherwise it returns to
    /// `pending` with a backoff deadline.
    pub fn record_failure(&mut self, now: u64, error: impl Into<String>) {
        self.retry_count = (self.retry_count + 1).min(self.max_retries);
        self.last_attempt = Some(now);
        self.error = Some(error.into());

        if self.retry_count >= self.max_retries {
            self.status = QueueStatus::Failed;
            self.next_retry = None;
        } else {
            self.status = QueueStatus::Pending;
            self.next_retry = Some(now + retry_delay_ms(self.retry_count));
        }
    }

    /// Returns a failed item to the pending state with a fresh retry budget.
    pub fn reset_for_retry(&mut self) {
        self.status = QueueStatus::Pending;
        self.retry_count = 0;
        self.next_retry = None;
        self.error = None;
    }
}

#[cfg(test)]
#[path = "queue_item_tests.rs"]
mod tests;
