// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    conflict: String,
    choice: String,
}

fn entry(conflict: &str, choice: &str) -> Entry {
    Entry {
        conflict: conflict.into(),
        choice: choice.into(),
    }
}

#[test]
fn append_creates_file_if_missing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    append(&path, &entry("c-1", "local")).unwrap();

    assert!(path.exists());
}

#[test]
fn read_all_returns_empty_for_missing_file() {
    let dir = TempDir::new().unwrap();
    let records: Vec<Entry> = read_all(&dir.path().join("missing.jsonl")).unwrap();
    assert!(records.is_empty());
}

#[test]
fn appends_are_read_back_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    append(&path, &entry("c-1", "local")).unwrap();
    append(&path, &entry("c-1", "local")).unwrap();
    append(&path, &entry("c-2", "server")).unwrap();

    let records: Vec<Entry> = read_all(&path).unwrap();
    assert_eq!(
        records,
        vec![
            entry("c-1", "local"),
            entry("c-1", "local"),
            entry("c-2", "server")
        ]
    );
}

#[test]
fn read_all_skips_blank_and_torn_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    std::fs::write(
        &path,
        "{\"conflict\":\"c-1\",\"choice\":\"local\"}\n\n{\"conflict\":\"c-2\",\"cho",
    )
    .unwrap();

    let records: Vec<Entry> = read_all(&path).unwrap();
    assert_eq!(records, vec![entry("c-1", "local")]);
}
