// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSON Lines log.
//!
//! Backs the conflict resolution audit history. Every record is one line,
//! fsynced on append. A torn final line left by a crash is skipped on read.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Appends a record to a JSONL file with fsync for durability.
pub fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let json = serde_json::to_string(record)?;
    writeln!(file, "{json}")?;
    file.sync_all()?;

    Ok(())
}

/// Reads every record in file order.
///
/// Returns an empty vec if the file doesn't exist. Blank and unparsable lines
/// are skipped.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "skipping unreadable log line"
            ),
        }
    }

    Ok(records)
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
