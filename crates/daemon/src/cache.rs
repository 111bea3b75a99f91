// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned response cache.
//!
//! Responses live in named partitions (`static-v1`, `api-v1`, `media-v1`).
//! Bumping the cache version and calling [`CacheStore::activate`] drops every
//! partition the new version does not own, so stale assets never outlive a
//! release.

use std::path::Path;

use bz_core::{ClockSource, HttpResponse, SystemClock};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS responses (
    partition TEXT NOT NULL,
    key TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    stored_at INTEGER NOT NULL,
    PRIMARY KEY (partition, key)
);
"#;

/// Kind of content a partition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Scripts, styles, fonts.
    Static,
    /// API reads.
    Api,
    /// Images and other media.
    Media,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Static, Partition::Api, Partition::Media];

    /// Partition name for a cache version.
    pub fn name(self, version: u32) -> String {
        let prefix = match self {
            Partition::Static => "static",
            Partition::Api => "api",
            Partition::Media => "media",
        };
        format!("{prefix}-v{version}")
    }
}

/// A stored response plus when it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub response: HttpResponse,
    pub stored_at: u64,
}

/// SQLite-backed cache of HTTP responses.
pub struct CacheStore {
    conn: Connection,
    version: u32,
}

impl CacheStore {
    /// Opens (creating if needed) the cache at `path`, scoped to `version`.
    pub fn open(path: &Path, version: u32) -> Result<Self> {
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
        conn.execute_batch(SCHEMA)?;
        Ok(CacheStore { conn, version })
    }

    /// Opens an in-memory cache (for testing).
    pub fn open_in_memory(version: u32) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(CacheStore { conn, version })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn get(&self, partition: Partition, key: &str) -> Result<Option<CachedResponse>> {
        let cached = self
            .conn
            .query_row(
                "SELECT status, content_type, body, stored_at FROM responses
                 WHERE partition = ?1 AND key = ?2",
                params![partition.name(self.version), key],
                |row| {
                    let content_type: Option<String> = row.get(1)?;
                    Ok(CachedResponse {
                        response: HttpResponse::new(
                            row.get(0)?,
                            content_type.as_deref(),
                            row.get::<_, Vec<u8>>(2)?,
                        ),
                        stored_at: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(cached)
    }

    /// Stores `response` under `key`, replacing any previous entry.
    pub fn put(&self, partition: Partition, key: &str, response: &HttpResponse) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO responses (partition, key, status, content_type, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                partition.name(self.version),
                key,
                response.status,
                response.content_type,
                response.body,
                SystemClock.now_ms() as i64,
            ],
        )?;
        Ok(())
    }

    /// Names of every partition holding at least one entry.
    pub fn partitions(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT partition FROM responses ORDER BY partition")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Deletes every partition not owned by the current version. Returns the
    /// number of partitions removed.
    pub fn activate(&self) -> Result<usize> {
        let allowed: Vec<String> = Partition::ALL
            .iter()
            .map(|p| p.name(self.version))
            .collect();
        let mut removed = 0;
        for name in self.partitions()? {
            if allowed.contains(&name) {
                continue;
            }
            self.conn
                .execute("DELETE FROM responses WHERE partition = ?1", params![name])?;
            tracing::info!(partition = %name, "dropped stale cache partition");
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
