// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::testing::TestContext;
use bz_core::QueueStats;

#[test]
fn status_lines_cover_every_field() {
    let mut status = DaemonStatus::new(4242, 90);
    status.online = true;
    status.queue = QueueStats {
        pending: 2,
        syncing: 1,
        failed: 0,
        total: 3,
    };
    status.pending_conflicts = 1;
    status.cache_version = 2;
    status.subscribers = 1;

    assert_eq!(
        status_lines(&status),
        vec![
            "Status: running",
            "PID: 4242",
            "Uptime: 90s",
            "Network: online",
            "Queue: 2 pending, 1 syncing, 0 failed (3 total)",
            "Conflicts: 1 pending",
            "Cache: v2",
            "Watchers: 1",
        ]
    );
}

#[test]
fn watch_without_daemon_is_an_error() {
    let ctx = TestContext::new();
    let err = run(&ctx.config, DaemonCommand::Watch).unwrap_err();
    assert!(matches!(err, Error::DaemonNotRunning));
}

#[test]
fn stop_and_status_without_daemon_succeed() {
    let ctx = TestContext::new();
    run(&ctx.config, DaemonCommand::Stop).unwrap();
    run(&ctx.config, DaemonCommand::Status).unwrap();
}
