// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use crate::test_support::{FakeUpstream, TestDaemon};

#[test]
fn status_reports_queue_and_cache() {
    let daemon = TestDaemon::new(FakeUpstream::offline());
    daemon.enqueue("offer.create");
    daemon.enqueue("chat.send");

    let status = daemon.state.status().unwrap();
    assert_eq!(status.pid, std::process::id());
    assert!(!status.online);
    assert_eq!(status.queue.pending, 2);
    assert_eq!(status.pending_conflicts, 0);
    assert_eq!(status.cache_version, 1);
    assert_eq!(status.subscribers, 0);
}

#[test]
fn set_online_returns_previous_value() {
    let daemon = TestDaemon::new(FakeUpstream::offline());
    assert!(!daemon.state.set_online(true));
    assert!(daemon.state.set_online(false));
    assert!(!daemon.state.is_online());
}

#[test]
fn subscribers_are_counted_while_attached() {
    let daemon = TestDaemon::new(FakeUpstream::offline());
    let first = daemon.state.subscribe();
    let second = daemon.state.subscribe();
    assert_eq!(daemon.state.subscribers(), 2);

    drop(first);
    drop(second);
    assert_eq!(daemon.state.subscribers(), 0);
}

#[tokio::test]
async fn sync_request_is_kept_until_the_worker_waits() {
    let daemon = TestDaemon::new(FakeUpstream::offline());
    daemon.state.request_sync();
    daemon.state.request_sync();

    let first =
        tokio::time::timeout(Duration::from_millis(100), daemon.state.sync_requested()).await;
    assert!(first.is_ok());
    let second =
        tokio::time::timeout(Duration::from_millis(100), daemon.state.sync_requested()).await;
    assert!(second.is_err(), "requests should collapse into one");
}

#[tokio::test]
async fn shutdown_wakes_waiters() {
    let daemon = TestDaemon::new(FakeUpstream::offline());
    let state = daemon.state.clone();
    let waiter = tokio::spawn(async move { state.cancelled().await });

    daemon.state.shutdown();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}
