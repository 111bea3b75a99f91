// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::queue_item::PRIORITY_NORMAL;
use serde_json::{json, Map};
use tempfile::TempDir;

fn item(kind: &str, priority: u8, created_at: u64) -> QueueItem {
    QueueItem::new(kind, json!({"n": kind}), priority, created_at)
}

fn key() -> EntityKey {
    EntityKey {
        entity_type: "listing".into(),
        entity_id: "l-1".into(),
    }
}

fn record(id: &str) -> ConflictRecord {
    let mut local = Map::new();
    local.insert("price".into(), json!(40));
    let mut server = Map::new();
    server.insert("price".into(), json!(45));
    ConflictRecord {
        id: id.into(),
        entity_type: "listing".into(),
        entity_id: "l-1".into(),
        conflicted_fields: vec!["price".into()],
        local_version: local,
        server_version: server,
        local_timestamp: 1,
        server_timestamp: 2,
    }
}

#[test]
fn migrations_set_user_version() {
    let store = SqliteStore::open_in_memory().unwrap();
    let version: i64 = store
        .lock()
        .unwrap()
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[test]
fn migrations_are_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    run_migrations(&conn).unwrap();
}

#[test]
fn newer_schema_is_refused() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA user_version = 99").unwrap();
    let err = run_migrations(&conn).unwrap_err();
    assert!(matches!(err, Error::SchemaVersion { found: 99, .. }));
}

#[test]
fn put_and_get_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut original = item("listing.update", PRIORITY_NORMAL, 10);
    original.record_failure(20, "timeout");

    store.put(&original).unwrap();
    assert_eq!(store.get(&original.id).unwrap(), Some(original));
}

#[test]
fn get_missing_returns_none() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.get("q-nope").unwrap(), None);
}

#[test]
fn replace_keeps_insertion_order() {
    let store = SqliteStore::open_in_memory().unwrap();
    let a = item("a", 5, 100);
    let b = item("b", 5, 100);
    store.put(&a).unwrap();
    store.put(&b).unwrap();

    // Rewriting `a` must not move it behind `b`
    let mut a2 = a.clone();
    a2.error = Some("retrying".into());
    store.put(&a2).unwrap();

    let ids: Vec<_> = store.all().unwrap().into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
}

#[test]
fn query_by_status_filters_and_orders() {
    let store = SqliteStore::open_in_memory().unwrap();
    let low = item("low", 9, 1);
    let high = item("high", 2, 5);
    let mut failed = item("failed", 1, 1);
    failed.status = QueueStatus::Failed;
    for i in [&low, &high, &failed] {
        store.put(i).unwrap();
    }

    let pending: Vec<_> = store
        .query_by_status(QueueStatus::Pending)
        .unwrap()
        .into_iter()
        .map(|i| i.kind)
        .collect();
    assert_eq!(pending, vec!["high", "low"]);
    assert_eq!(store.query_by_status(QueueStatus::Failed).unwrap().len(), 1);
}

#[test]
fn delete_reports_existence() {
    let store = SqliteStore::open_in_memory().unwrap();
    let i = item("a", 5, 1);
    store.put(&i).unwrap();

    assert!(store.delete(&i.id).unwrap());
    assert!(!store.delete(&i.id).unwrap());
}

#[test]
fn update_applies_and_persists() {
    let store = SqliteStore::open_in_memory().unwrap();
    let i = item("a", 5, 1);
    store.put(&i).unwrap();

    let updated = store
        .update(&i.id, &mut |item| item.priority = 1)
        .unwrap()
        .unwrap();
    assert_eq!(updated.priority, 1);
    assert_eq!(store.get(&i.id).unwrap().unwrap().priority, 1);
}

#[test]
fn update_missing_returns_none() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut called = false;
    let result = store.update("q-nope", &mut |_| called = true).unwrap();
    assert!(result.is_none());
    assert!(!called);
}

#[test]
fn items_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("bazaar.db");
    let i = item("a", 5, 1);

    {
        let store = SqliteStore::open(&path).unwrap();
        store.put(&i).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.get(&i.id).unwrap(), Some(i));
}

#[test]
fn two_handles_share_one_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bazaar.db");
    let foreground = SqliteStore::open(&path).unwrap();
    let background = SqliteStore::open(&path).unwrap();

    let i = item("a", 5, 1);
    foreground.put(&i).unwrap();
    assert!(background.delete(&i.id).unwrap());
    assert!(foreground.get(&i.id).unwrap().is_none());
}

#[test]
fn corrupted_status_is_reported() {
    let store = SqliteStore::open_in_memory().unwrap();
    let i = item("a", 5, 1);
    store.put(&i).unwrap();
    store
        .lock()
        .unwrap()
        .execute("UPDATE queue_items SET status = 'lost'", [])
        .unwrap();

    assert!(store.get(&i.id).is_err());
}

#[test]
fn conflict_roundtrip_and_entity_lookup() {
    let store = SqliteStore::open_in_memory().unwrap();
    let r = record("c-1");
    store.put_conflict(&r).unwrap();

    assert_eq!(store.get_conflict("c-1").unwrap(), Some(r.clone()));
    assert_eq!(store.conflict_for_entity(&key()).unwrap(), Some(r.clone()));
    assert_eq!(store.pending_conflicts().unwrap(), vec![r]);

    assert!(store.delete_conflict("c-1").unwrap());
    assert!(!store.delete_conflict("c-1").unwrap());
    assert!(store.conflict_for_entity(&key()).unwrap().is_none());
}

#[test]
fn local_version_upserts() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.local_version(&key()).unwrap().is_none());

    let mut snapshot = EntitySnapshot {
        entity_type: "listing".into(),
        entity_id: "l-1".into(),
        fields: Map::new(),
        timestamp: 1,
    };
    store.put_local_version(&snapshot).unwrap();
    snapshot.fields.insert("title".into(), json!("Bike"));
    snapshot.timestamp = 2;
    store.put_local_version(&snapshot).unwrap();

    assert_eq!(store.local_version(&key()).unwrap(), Some(snapshot));
}
