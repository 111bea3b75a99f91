// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict detection and whole-record resolution.
//!
//! The resolver owns the local entity cache. Optimistic writes land there
//! when a mutation is enqueued; a sync acknowledgment either settles the
//! entity to the server version or, if any submitted field disagrees,
//! produces a [`ConflictRecord`]. While a record is pending its entity is
//! blocked: the sync queue holds further mutations for it.
//!
//! Resolution picks one side wholesale. There is no field-level merge.
//! Every resolution is appended to a JSONL audit history.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::ClockSource;
use crate::error::{Error, Result};
use crate::jsonl;
use crate::queue_item::{EntityKey, Mutation};
use crate::store::ConflictStore;

/// A versioned view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub timestamp: u64,
}

impl EntitySnapshot {
    pub fn key(&self) -> EntityKey {
        EntityKey {
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
        }
    }
}

/// A divergence between the local and server versions of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub conflicted_fields: Vec<String>,
    pub local_version: Map<String, Value>,
    pub server_version: Map<String, Value>,
    pub local_timestamp: u64,
    pub server_timestamp: u64,
}

impl ConflictRecord {
    pub fn key(&self) -> EntityKey {
        EntityKey {
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
        }
    }

    /// The version a choice selects.
    pub fn version(&self, choice: Choice) -> &Map<String, Value> {
        match choice {
            Choice::Local => &self.local_version,
            Choice::Server => &self.server_version,
        }
    }

    fn timestamp(&self, choice: Choice) -> u64 {
        match choice {
            Choice::Local => self.local_timestamp,
            Choice::Server => self.server_timestamp,
        }
    }

    /// Folds a newer divergence on the same entity into this record.
    fn absorb(&mut self, other: ConflictRecord) {
        for field in other.conflicted_fields {
            if !self.conflicted_fields.contains(&field) {
                self.conflicted_fields.push(field);
            }
        }
        self.local_version.extend(other.local_version);
        self.server_version.extend(other.server_version);
        self.local_timestamp = self.local_timestamp.max(other.local_timestamp);
        self.server_timestamp = self.server_timestamp.max(other.server_timestamp);
    }
}

/// Which side wins a manual resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Local,
    Server,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Local => "local",
            Choice::Server => "server",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Choice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Choice::Local),
            "server" => Ok(Choice::Server),
            _ => Err(Error::CorruptedData(format!(
                "invalid resolution choice '{s}' (expected local or server)"
            ))),
        }
    }
}

/// One line of the audit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub record: ConflictRecord,
    pub choice: Choice,
    pub resolved_at: u64,
}

/// Outcome of [`ConflictResolver::manual_resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub record: ConflictRecord,
    pub choice: Choice,
    /// The version now held in the local entity cache.
    pub applied: EntitySnapshot,
    /// False when the id was found only in history (a repeated resolution).
    pub was_pending: bool,
}

/// Outcome of comparing an acknowledgment against a submitted mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Server agreed. Local cache now matches the server.
    Settled,
    /// Server disagreed on at least one field. The entity is now blocked.
    Conflict(ConflictRecord),
}

/// Detects, stores, and resolves conflicts.
pub struct ConflictResolver<S, C> {
    store: Arc<S>,
    clock: C,
    history_path: PathBuf,
}

impl<S: ConflictStore, C: ClockSource> ConflictResolver<S, C> {
    pub fn new(store: Arc<S>, clock: C, history_path: PathBuf) -> Self {
        ConflictResolver {
            store,
            clock,
            history_path,
        }
    }

    /// Records an optimistic local write.
    pub fn record_local(&self, mutation: &Mutation) -> Result<EntitySnapshot> {
        let key = mutation.key();
        let mut snapshot = self.store.local_version(&key)?.unwrap_or(EntitySnapshot {
            entity_type: key.entity_type,
            entity_id: key.entity_id,
            fields: Map::new(),
            timestamp: 0,
        });
        snapshot
            .fields
            .extend(mutation.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        snapshot.timestamp = self.clock.now_ms();
        self.store.put_local_version(&snapshot)?;
        Ok(snapshot)
    }

    pub fn local_version(&self, key: &EntityKey) -> Result<Option<EntitySnapshot>> {
        self.store.local_version(key)
    }

    /// True while the entity has a pending conflict.
    pub fn is_blocked(&self, key: &EntityKey) -> Result<bool> {
        Ok(self.store.conflict_for_entity(key)?.is_some())
    }

    pub fn get_pending_conflicts(&self) -> Result<Vec<ConflictRecord>> {
        self.store.pending_conflicts()
    }

    /// Compares an acknowledged server version with what was submitted.
    pub fn reconcile(
        &self,
        submitted: &Mutation,
        server: &EntitySnapshot,
    ) -> Result<Reconciliation> {
        let key = submitted.key();
        let divergent: Vec<String> = submitted
            .fields
            .iter()
            .filter(|(name, value)| server.fields.get(name.as_str()) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect();

        let existing = self.store.conflict_for_entity(&key)?;

        if divergent.is_empty() {
            match existing {
                Some(mut record) => {
                    record.server_version.extend(server.fields.clone());
                    record.server_timestamp = record.server_timestamp.max(server.timestamp);
                    self.store.put_conflict(&record)?;
                }
                None => {
                    let mut local = self
                        .store
                        .local_version(&key)?
                        .unwrap_or_else(|| server.clone());
                    local.fields.extend(server.fields.clone());
                    local.timestamp = server.timestamp;
                    self.store.put_local_version(&local)?;
                }
            }
            return Ok(Reconciliation::Settled);
        }

        let local = self.store.local_version(&key)?;
        let (local_version, local_timestamp) = match local {
            Some(snapshot) => (snapshot.fields, snapshot.timestamp),
            None => (submitted.fields.clone(), self.clock.now_ms()),
        };
        let incoming = ConflictRecord {
            id: format!("c-{}", uuid::Uuid::new_v4().simple()),
            entity_type: key.entity_type.clone(),
            entity_id: key.entity_id.clone(),
            conflicted_fields: divergent,
            local_version,
            server_version: server.fields.clone(),
            local_timestamp,
            server_timestamp: server.timestamp,
        };

        let record = match existing {
            Some(mut record) => {
                record.absorb(incoming);
                record
            }
            None => incoming,
        };
        self.store.put_conflict(&record)?;

        tracing::warn!(
            entity = %key,
            conflict = %record.id,
            fields = ?record.conflicted_fields,
            "sync acknowledgment diverges from local version"
        );
        Ok(Reconciliation::Conflict(record))
    }

    /// Applies one side of a conflict wholesale.
    ///
    /// An id already resolved is looked up in the history and applied again,
    /// which yields the same entity state and one more history entry.
    pub fn manual_resolve(&self, id: &str, choice: Choice) -> Result<Resolution> {
        let (record, was_pending) = match self.store.get_conflict(id)? {
            Some(record) => (record, true),
            None => {
                let previous = self
                    .history()?
                    .into_iter()
                    .rev()
                    .find(|entry| entry.record.id == id)
                    .ok_or_else(|| Error::ConflictNotFound(id.to_string()))?;
                (previous.record, false)
            }
        };

        let applied = EntitySnapshot {
            entity_type: record.entity_type.clone(),
            entity_id: record.entity_id.clone(),
            fields: record.version(choice).clone(),
            timestamp: record.timestamp(choice),
        };
        self.store.put_local_version(&applied)?;
        if was_pending {
            self.store.delete_conflict(&record.id)?;
        }

        jsonl::append(
            &self.history_path,
            &HistoryEntry {
                record: record.clone(),
                choice,
                resolved_at: self.clock.now_ms(),
            },
        )?;

        tracing::info!(conflict = %record.id, entity = %record.key(), %choice, "conflict resolved");
        Ok(Resolution {
            record,
            choice,
            applied,
            was_pending,
        })
    }

    /// Every resolution ever made, oldest first.
    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        jsonl::read_all(&self.history_path)
    }
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
