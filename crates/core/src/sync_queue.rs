// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Prioritized, retryable queue of offline mutations.
//!
//! Items are persisted before `enqueue` returns. A processing pass claims up
//! to `batch_size` due items (priority, then insertion order), sends them
//! concurrently, and records each outcome independently: success deletes the
//! item, failure schedules a retry or marks it failed once the retry budget
//! is spent.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::clock::ClockSource;
use crate::conflict::{
    Choice, ConflictRecord, ConflictResolver, EntitySnapshot, Reconciliation, Resolution,
};
use crate::error::{Error, ErrorClass, Result};
use crate::queue_item::{
    validate_priority, Mutation, QueueItem, QueueStatus, DEFAULT_MAX_RETRIES, PRIORITY_CRITICAL,
    PRIORITY_NORMAL,
};
use crate::store::{ConflictStore, QueueStore};

/// Server response to a delivered mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncAck {
    /// Server's version of the mutated entity, when it returns one.
    #[serde(default)]
    pub entity: Option<EntitySnapshot>,
}

/// Why a delivery attempt failed.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("server rejected credentials ({0})")]
    Unauthorized(u16),
}

impl SendError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SendError::Transport(_) | SendError::Status { .. } => ErrorClass::Transport,
            SendError::Unauthorized(_) => ErrorClass::Authentication,
        }
    }
}

/// Delivers queued mutations to the server.
pub trait MutationSender: Send + Sync {
    fn send<'a>(
        &'a self,
        item: &'a QueueItem,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<SyncAck, SendError>> + Send + 'a>>;
}

/// Processing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Items attempted concurrently per pass.
    pub batch_size: usize,
    /// Retry ceiling stamped on new items.
    pub max_retries: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            batch_size: 10,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// What one or more processing passes did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures that spent the item's last retry.
    pub exhausted: usize,
    /// Pending items left alone (not yet due, or entity blocked by a conflict).
    pub skipped: usize,
    pub synced_ids: Vec<String>,
    pub conflicts: Vec<String>,
    pub auth_failed: bool,
}

impl PassReport {
    fn merge(&mut self, other: PassReport) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.exhausted += other.exhausted;
        self.skipped = other.skipped;
        self.synced_ids.extend(other.synced_ids);
        self.conflicts.extend(other.conflicts);
        self.auth_failed |= other.auth_failed;
    }
}

/// Item counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub syncing: usize,
    pub failed: usize,
    pub total: usize,
}

/// The durable mutation queue.
pub struct SyncQueue<S, C> {
    store: Arc<S>,
    clock: C,
    options: SyncOptions,
    resolver: ConflictResolver<S, C>,
}

impl<S, C> SyncQueue<S, C>
where
    S: QueueStore + ConflictStore,
    C: ClockSource + Clone,
{
    /// Creates a queue over `store`. Conflict history goes to `history_path`.
    pub fn new(store: Arc<S>, clock: C, options: SyncOptions, history_path: PathBuf) -> Self {
        let resolver = ConflictResolver::new(Arc::clone(&store), clock.clone(), history_path);
        SyncQueue {
            store,
            clock,
            options,
            resolver,
        }
    }

    pub fn resolver(&self) -> &ConflictResolver<S, C> {
        &self.resolver
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Persists a new mutation and returns it.
    ///
    /// Entity mutations also update the local entity cache optimistically.
    pub fn enqueue(&self, kind: &str, payload: Value, priority: u8) -> Result<QueueItem> {
        let priority = validate_priority(priority)?;
        let item = QueueItem::new(kind, payload, priority, self.clock.now_ms())
            .with_max_retries(self.options.max_retries);
        self.store.put(&item)?;

        if let Some(mutation) = item.mutation() {
            self.resolver.record_local(&mutation)?;
        }

        tracing::info!(id = %item.id, kind, priority, "mutation queued");
        Ok(item)
    }

    /// Returns every item left `syncing` by a crashed pass to `pending`.
    ///
    /// Only safe while no other process can be mid-pass.
    pub fn recover_interrupted(&self) -> Result<usize> {
        self.recover_stale(Duration::ZERO)
    }

    /// Returns `syncing` items claimed at least `older_than` ago to
    /// `pending`. Younger claims belong to a pass that may still be running.
    pub fn recover_stale(&self, older_than: Duration) -> Result<usize> {
        let cutoff = self.clock.now_ms().saturating_sub(older_than.as_millis() as u64);
        let mut recovered = 0;
        for item in self.store.query_by_status(QueueStatus::Syncing)? {
            let mut reset = false;
            self.store.update(&item.id, &mut |i| {
                let stale = i.last_attempt.is_none_or(|at| at <= cutoff);
                if i.status == QueueStatus::Syncing && stale {
                    i.status = QueueStatus::Pending;
                    reset = true;
                }
            })?;
            if reset {
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::info!(recovered, "recovered interrupted queue items");
        }
        Ok(recovered)
    }

    /// Time until the earliest backed-off item becomes due, or `None` when
    /// no pending item is waiting on a retry delay.
    ///
    /// Items held behind a conflict are not counted.
    pub fn next_retry_in(&self) -> Result<Option<Duration>> {
        let now = self.clock.now_ms();
        let mut earliest: Option<u64> = None;
        for item in self.store.query_by_status(QueueStatus::Pending)? {
            let Some(at) = item.next_retry else {
                continue;
            };
            if let Some(mutation) = item.mutation() {
                if self.resolver.is_blocked(&mutation.key())? {
                    continue;
                }
            }
            earliest = Some(earliest.map_or(at, |e| e.min(at)));
        }
        Ok(earliest.map(|at| Duration::from_millis(at.saturating_sub(now))))
    }

    /// Runs one processing pass.
    pub async fn process_pass(&self, sender: &dyn MutationSender) -> Result<PassReport> {
        let now = self.clock.now_ms();
        let mut report = PassReport::default();

        let mut candidates = Vec::new();
        for item in self.store.query_by_status(QueueStatus::Pending)? {
            if candidates.len() >= self.options.batch_size {
                break;
            }
            if !item.is_due(now) {
                report.skipped += 1;
                continue;
            }
            if let Some(mutation) = item.mutation() {
                if self.resolver.is_blocked(&mutation.key())? {
                    tracing::debug!(
                        id = %item.id,
                        entity = %mutation.key(),
                        "held behind pending conflict"
                    );
                    report.skipped += 1;
                    continue;
                }
            }
            candidates.push(item);
        }

        let mut claimed = Vec::with_capacity(candidates.len());
        for item in candidates {
            let mut won = false;
            let updated = self.store.update(&item.id, &mut |i| {
                if i.status == QueueStatus::Pending {
                    i.status = QueueStatus::Syncing;
                    i.last_attempt = Some(now);
                    won = true;
                }
            });
            match updated {
                Ok(Some(item)) if won => claimed.push(item),
                Ok(_) => {}
                Err(e) => {
                    report.skipped += 1;
                    tracing::error!(
                        id = %item.id,
                        class = %ErrorClass::Persistence,
                        error = %e,
                        "could not claim item"
                    );
                }
            }
        }

        if claimed.is_empty() {
            return Ok(report);
        }

        let outcomes = join_all(claimed.iter().map(|item| sender.send(item))).await;

        for (item, outcome) in claimed.iter().zip(outcomes) {
            report.processed += 1;
            if let Err(e) = self.record_outcome(item, outcome, &mut report) {
                report.failed += 1;
                tracing::error!(
                    id = %item.id,
                    class = %ErrorClass::Persistence,
                    error = %e,
                    "could not record sync outcome"
                );
            }
        }

        Ok(report)
    }

    /// Persists one delivery outcome. Counters are only bumped once the
    /// store write went through.
    fn record_outcome(
        &self,
        item: &QueueItem,
        outcome: std::result::Result<SyncAck, SendError>,
        report: &mut PassReport,
    ) -> Result<()> {
        match outcome {
            Ok(ack) => {
                self.store.delete(&item.id)?;
                report.succeeded += 1;
                report.synced_ids.push(item.id.clone());
                tracing::debug!(id = %item.id, "mutation synced");

                if let (Some(server), Some(mutation)) = (ack.entity, item.mutation()) {
                    match self.resolver.reconcile(&mutation, &server) {
                        Ok(Reconciliation::Conflict(record)) => {
                            if !report.conflicts.contains(&record.id) {
                                report.conflicts.push(record.id);
                            }
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(
                            id = %item.id,
                            entity = %mutation.key(),
                            class = %ErrorClass::Persistence,
                            error = %e,
                            "could not reconcile server version"
                        ),
                    }
                }
            }
            Err(SendError::Unauthorized(status)) => {
                report.auth_failed = true;
                let message = SendError::Unauthorized(status).to_string();
                self.store.update(&item.id, &mut |i| {
                    i.status = QueueStatus::Pending;
                    i.next_retry = None;
                    i.error = Some(message.clone());
                })?;
                report.failed += 1;
                tracing::warn!(id = %item.id, status, "sync halted: credentials rejected");
            }
            Err(e) => {
                let failed_at = self.clock.now_ms();
                let message = e.to_string();
                let updated = self
                    .store
                    .update(&item.id, &mut |i| i.record_failure(failed_at, message.clone()))?;
                report.failed += 1;

                match updated {
                    Some(i) if i.status == QueueStatus::Failed => {
                        report.exhausted += 1;
                        tracing::warn!(
                            id = %i.id,
                            retries = i.retry_count,
                            class = %ErrorClass::RetryExhausted,
                            error = %message,
                            "mutation failed permanently"
                        );
                    }
                    Some(i) => tracing::info!(
                        id = %i.id,
                        retry = i.retry_count,
                        next_retry = ?i.next_retry,
                        error = %message,
                        "mutation failed, will retry"
                    ),
                    None => {}
                }
            }
        }
        Ok(())
    }

    /// Runs passes until nothing more is due or credentials are rejected.
    pub async fn drain(&self, sender: &dyn MutationSender) -> Result<PassReport> {
        let mut total = PassReport::default();
        loop {
            let pass = self.process_pass(sender).await?;
            let done = pass.processed == 0 || pass.auth_failed;
            total.merge(pass);
            if done {
                break;
            }
        }
        Ok(total)
    }

    /// Returns every failed item to `pending` with a fresh retry budget.
    pub fn retry_failed(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.store.query_by_status(QueueStatus::Failed)? {
            self.store.update(&item.id, &mut |i| {
                if i.status == QueueStatus::Failed {
                    i.reset_for_retry();
                }
            })?;
            count += 1;
        }
        Ok(count)
    }

    /// Deletes every failed item.
    pub fn clear_failed(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.store.query_by_status(QueueStatus::Failed)? {
            if self.store.delete(&item.id)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Bumps a pending item to critical priority.
    pub fn promote(&self, id: &str) -> Result<QueueItem> {
        let mut status = None;
        let updated = self.store.update(id, &mut |i| {
            status = Some(i.status);
            if i.status == QueueStatus::Pending {
                i.priority = PRIORITY_CRITICAL;
            }
        })?;

        match (updated, status) {
            (Some(item), Some(QueueStatus::Pending)) => Ok(item),
            (Some(item), _) => Err(Error::InvalidItemState {
                id: item.id,
                status: item.status.to_string(),
                expected: "pending",
                action: "promoted",
            }),
            (None, _) => Err(Error::ItemNotFound(id.to_string())),
        }
    }

    /// Deletes one item. Deleting a missing id is not an error.
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<QueueItem>> {
        self.store.get(id)
    }

    /// Every item in processing order.
    pub fn list(&self) -> Result<Vec<QueueItem>> {
        self.store.all()
    }

    pub fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats::default();
        for item in self.store.all()? {
            match item.status {
                QueueStatus::Pending => stats.pending += 1,
                QueueStatus::Syncing => stats.syncing += 1,
                QueueStatus::Failed => stats.failed += 1,
                QueueStatus::Synced => {}
            }
            stats.total += 1;
        }
        Ok(stats)
    }

    pub fn pending_conflicts(&self) -> Result<Vec<ConflictRecord>> {
        self.resolver.get_pending_conflicts()
    }

    /// Resolves a conflict. Choosing `local` on a pending record re-queues
    /// the local version for delivery.
    pub fn resolve_conflict(
        &self,
        id: &str,
        choice: Choice,
    ) -> Result<(Resolution, Option<QueueItem>)> {
        let resolution = self.resolver.manual_resolve(id, choice)?;
        if choice != Choice::Local || !resolution.was_pending {
            return Ok((resolution, None));
        }

        let mutation = Mutation {
            entity_type: resolution.record.entity_type.clone(),
            entity_id: resolution.record.entity_id.clone(),
            fields: resolution.applied.fields.clone(),
        };
        let kind = format!("{}.update", mutation.entity_type);
        let payload = serde_json::to_value(&mutation)?;
        let item = QueueItem::new(kind, payload, PRIORITY_NORMAL, self.clock.now_ms())
            .with_max_retries(self.options.max_retries);
        self.store.put(&item)?;
        tracing::info!(id = %item.id, conflict = %id, "local version re-queued");
        Ok((resolution, Some(item)))
    }
}

/// Builds an entity mutation payload.
pub fn mutation_payload(entity_type: &str, entity_id: &str, fields: Map<String, Value>) -> Value {
    serde_json::json!({
        "entityType": entity_type,
        "entityId": entity_id,
        "fields": fields,
    })
}

#[cfg(test)]
#[path = "sync_queue_tests.rs"]
mod tests;
