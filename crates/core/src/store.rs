// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed durable store.
//!
//! One database file is shared by the foreground CLI and the background
//! daemon. It holds queue items, pending conflict records, and the local
//! entity cache. Both processes open it in WAL mode with a busy timeout, and
//! read-modify-write sequences run inside `IMMEDIATE` transactions.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::conflict::{ConflictRecord, EntitySnapshot};
use crate::error::{Error, Result};
use crate::queue_item::{EntityKey, QueueItem, QueueStatus};

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 2;

/// Version 1: the queue.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS queue_items (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    payload TEXT NOT NULL,
    priority INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    last_attempt INTEGER,
    next_retry INTEGER,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_queue_items_status ON queue_items(status);
"#;

/// Version 2: conflict records and the local entity cache.
const SCHEMA_V2: &str = r#"
CREATE TABLE IF NOT EXISTS conflicts (
    id TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    conflicted_fields TEXT NOT NULL,
    local_version TEXT NOT NULL,
    server_version TEXT NOT NULL,
    local_timestamp INTEGER NOT NULL,
    server_timestamp INTEGER NOT NULL
);

-- One pending record per entity
CREATE UNIQUE INDEX IF NOT EXISTS idx_conflicts_entity ON conflicts(entity_type, entity_id);

CREATE TABLE IF NOT EXISTS entities (
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    fields TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    PRIMARY KEY (entity_type, entity_id)
);
"#;

const MIGRATIONS: [&str; 2] = [SCHEMA_V1, SCHEMA_V2];

/// Persistent storage for queue items.
pub trait QueueStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<QueueItem>>;

    /// Inserts or replaces an item. Insertion order is kept across replaces.
    fn put(&self, item: &QueueItem) -> Result<()>;

    /// Deletes an item. Returns false if it did not exist.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Items with the given status in processing order.
    fn query_by_status(&self, status: QueueStatus) -> Result<Vec<QueueItem>>;

    /// Every item in processing order.
    fn all(&self) -> Result<Vec<QueueItem>>;

    /// Atomically reads, modifies, and writes back one item.
    ///
    /// Returns the updated item, or `None` if the id does not exist.
    fn update(&self, id: &str, apply: &mut dyn FnMut(&mut QueueItem)) -> Result<Option<QueueItem>>;
}

/// Persistent storage for conflict records and the local entity cache.
pub trait ConflictStore: Send + Sync {
    fn pending_conflicts(&self) -> Result<Vec<ConflictRecord>>;
    fn conflict_for_entity(&self, key: &EntityKey) -> Result<Option<ConflictRecord>>;
    fn get_conflict(&self, id: &str) -> Result<Option<ConflictRecord>>;
    fn put_conflict(&self, record: &ConflictRecord) -> Result<()>;
    fn delete_conflict(&self, id: &str) -> Result<bool>;
    fn local_version(&self, key: &EntityKey) -> Result<Option<EntitySnapshot>>;
    fn put_local_version(&self, snapshot: &EntitySnapshot) -> Result<()>;
}

/// Runs every migration newer than the database's `user_version`.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(Error::SchemaVersion {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    for (index, sql) in MIGRATIONS.iter().enumerate() {
        let version = index as i64 + 1;
        if version > found {
            conn.execute_batch(sql)?;
            conn.execute_batch(&format!("PRAGMA user_version = {version}"))?;
            tracing::debug!(version, "applied store migration");
        }
    }
    Ok(())
}

/// SQLite store shared by the foreground and background contexts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating and migrating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        run_migrations(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }
}

/// Column list for queue item selects, in `queue_item_from_row` order.
const ITEM_COLUMNS: &str = "id, type, payload, priority, status, retry_count, max_retries,
     created_at, last_attempt, next_retry, error";

fn corrupted(column: &str, detail: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(format!(
            "invalid value in column '{column}': {detail}"
        ))),
    )
}

fn json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
    column: &str,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| corrupted(column, e))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn queue_item_from_row(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let status: String = row.get(4)?;
    Ok(QueueItem {
        id: row.get(0)?,
        kind: row.get(1)?,
        payload: json_column(row, 2, "payload")?,
        priority: row.get(3)?,
        status: status.parse().map_err(|e| corrupted("status", e))?,
        retry_count: row.get(5)?,
        max_retries: row.get(6)?,
        created_at: row.get::<_, i64>(7)? as u64,
        last_attempt: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
        next_retry: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
        error: row.get(10)?,
    })
}

fn get_item(conn: &Connection, id: &str) -> Result<Option<QueueItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM queue_items WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], queue_item_from_row)
        .optional()?)
}

fn put_item(conn: &Connection, item: &QueueItem) -> Result<()> {
    conn.execute(
        "INSERT INTO queue_items (id, type, payload, priority, status, retry_count,
         max_retries, created_at, last_attempt, next_retry, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
             type = excluded.type,
             payload = excluded.payload,
             priority = excluded.priority,
             status = excluded.status,
             retry_count = excluded.retry_count,
             max_retries = excluded.max_retries,
             created_at = excluded.created_at,
             last_attempt = excluded.last_attempt,
             next_retry = excluded.next_retry,
             error = excluded.error",
        params![
            item.id,
            item.kind,
            to_json(&item.payload)?,
            item.priority,
            item.status.as_str(),
            item.retry_count,
            item.max_retries,
            item.created_at as i64,
            item.last_attempt.map(|v| v as i64),
            item.next_retry.map(|v| v as i64),
            item.error,
        ],
    )?;
    Ok(())
}

impl QueueStore for SqliteStore {
    fn get(&self, id: &str) -> Result<Option<QueueItem>> {
        let conn = self.lock()?;
        get_item(&conn, id)
    }

    fn put(&self, item: &QueueItem) -> Result<()> {
        let conn = self.lock()?;
        put_item(&conn, item)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let changed = self
            .lock()?
            .execute("DELETE FROM queue_items WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn query_by_status(&self, status: QueueStatus) -> Result<Vec<QueueItem>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM queue_items WHERE status = ?1
             ORDER BY priority ASC, created_at ASC, rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![status.as_str()], queue_item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn all(&self) -> Result<Vec<QueueItem>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM queue_items
             ORDER BY priority ASC, created_at ASC, rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map([], queue_item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn update(&self, id: &str, apply: &mut dyn FnMut(&mut QueueItem)) -> Result<Option<QueueItem>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut item) = get_item(&tx, id)? else {
            return Ok(None);
        };
        apply(&mut item);
        put_item(&tx, &item)?;
        tx.commit()?;
        Ok(Some(item))
    }
}

const CONFLICT_COLUMNS: &str = "id, entity_type, entity_id, conflicted_fields, local_version,
     server_version, local_timestamp, server_timestamp";

fn conflict_from_row(row: &Row<'_>) -> rusqlite::Result<ConflictRecord> {
    Ok(ConflictRecord {
        id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        conflicted_fields: json_column(row, 3, "conflicted_fields")?,
        local_version: json_column(row, 4, "local_version")?,
        server_version: json_column(row, 5, "server_version")?,
        local_timestamp: row.get::<_, i64>(6)? as u64,
        server_timestamp: row.get::<_, i64>(7)? as u64,
    })
}

impl ConflictStore for SqliteStore {
    fn pending_conflicts(&self) -> Result<Vec<ConflictRecord>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {CONFLICT_COLUMNS} FROM conflicts ORDER BY server_timestamp, id");
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], conflict_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn conflict_for_entity(&self, key: &EntityKey) -> Result<Option<ConflictRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE entity_type = ?1 AND entity_id = ?2"
        );
        Ok(conn
            .query_row(&sql, params![key.entity_type, key.entity_id], conflict_from_row)
            .optional()?)
    }

    fn get_conflict(&self, id: &str) -> Result<Option<ConflictRecord>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id], conflict_from_row)
            .optional()?)
    }

    fn put_conflict(&self, record: &ConflictRecord) -> Result<()> {
        self.lock()?.execute(
            "INSERT OR REPLACE INTO conflicts (id, entity_type, entity_id, conflicted_fields,
             local_version, server_version, local_timestamp, server_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.entity_type,
                record.entity_id,
                to_json(&record.conflicted_fields)?,
                to_json(&record.local_version)?,
                to_json(&record.server_version)?,
                record.local_timestamp as i64,
                record.server_timestamp as i64,
            ],
        )?;
        Ok(())
    }

    fn delete_conflict(&self, id: &str) -> Result<bool> {
        let changed = self
            .lock()?
            .execute("DELETE FROM conflicts WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn local_version(&self, key: &EntityKey) -> Result<Option<EntitySnapshot>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT entity_type, entity_id, fields, timestamp FROM entities
                 WHERE entity_type = ?1 AND entity_id = ?2",
                params![key.entity_type, key.entity_id],
                |row| {
                    Ok(EntitySnapshot {
                        entity_type: row.get(0)?,
                        entity_id: row.get(1)?,
                        fields: json_column(row, 2, "fields")?,
                        timestamp: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?)
    }

    fn put_local_version(&self, snapshot: &EntitySnapshot) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO entities (entity_type, entity_id, fields, timestamp)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                 fields = excluded.fields,
                 timestamp = excluded.timestamp",
            params![
                snapshot.entity_type,
                snapshot.entity_id,
                to_json(&snapshot.fields)?,
                snapshot.timestamp as i64,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
