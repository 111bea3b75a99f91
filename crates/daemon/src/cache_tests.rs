// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

fn json(body: &str) -> HttpResponse {
    HttpResponse::new(200, Some("application/json"), body)
}

#[parameterized(
    static_v1 = { Partition::Static, 1, "static-v1" },
    api_v2 = { Partition::Api, 2, "api-v2" },
    media_v10 = { Partition::Media, 10, "media-v10" },
)]
fn partition_names_carry_version(partition: Partition, version: u32, expected: &str) {
    assert_eq!(partition.name(version), expected);
}

#[test]
fn put_then_get() {
    let cache = CacheStore::open_in_memory(1).unwrap();
    cache
        .put(Partition::Api, "GET /api/listings", &json("[1]"))
        .unwrap();

    let cached = cache.get(Partition::Api, "GET /api/listings").unwrap().unwrap();
    assert_eq!(cached.response, json("[1]"));
    assert!(cached.stored_at > 0);
}

#[test]
fn partitions_are_isolated() {
    let cache = CacheStore::open_in_memory(1).unwrap();
    cache.put(Partition::Static, "GET /app.js", &json("x")).unwrap();

    assert!(cache.get(Partition::Media, "GET /app.js").unwrap().is_none());
    assert_eq!(cache.partitions().unwrap(), vec!["static-v1"]);
}

#[test]
fn put_replaces_existing_entry() {
    let cache = CacheStore::open_in_memory(1).unwrap();
    cache.put(Partition::Api, "k", &json("old")).unwrap();
    cache.put(Partition::Api, "k", &json("new")).unwrap();

    let cached = cache.get(Partition::Api, "k").unwrap().unwrap();
    assert_eq!(cached.response.text(), "new");
}

#[test]
fn activate_drops_partitions_of_other_versions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    {
        let old = CacheStore::open(&path, 1).unwrap();
        old.put(Partition::Static, "GET /app.js", &json("v1")).unwrap();
        old.put(Partition::Api, "GET /api/listings", &json("[]")).unwrap();
    }

    let cache = CacheStore::open(&path, 2).unwrap();
    cache.put(Partition::Api, "GET /api/listings", &json("[2]")).unwrap();

    assert_eq!(cache.activate().unwrap(), 2);
    assert_eq!(cache.partitions().unwrap(), vec!["api-v2"]);
    assert_eq!(
        cache.get(Partition::Api, "GET /api/listings").unwrap().unwrap().response.text(),
        "[2]"
    );
}

#[test]
fn activate_on_current_version_is_a_no_op() {
    let cache = CacheStore::open_in_memory(3).unwrap();
    cache.put(Partition::Media, "GET /media/a.png", &json("x")).unwrap();

    assert_eq!(cache.activate().unwrap(), 0);
    assert_eq!(cache.version(), 3);
}
