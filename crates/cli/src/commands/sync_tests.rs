// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::testing::{AcceptAll, RejectAll, TestContext};
use bz_core::{ClockSource, QueueStatus, SystemClock};
use serde_json::json;

const STALE_AFTER: Duration = Duration::from_secs(60);

#[tokio::test]
async fn drain_delivers_everything_due() {
    let ctx = TestContext::new();
    let a = ctx.enqueue("offer.create", json!({"n": 1}));
    let b = ctx.enqueue("offer.create", json!({"n": 2}));

    let report = drain_impl(&ctx.queue, &AcceptAll, STALE_AFTER).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.succeeded, 2);
    assert!(report.synced_ids.contains(&a.id));
    assert!(report.synced_ids.contains(&b.id));
    assert!(ctx.queue.list().unwrap().is_empty());
}

#[tokio::test]
async fn drain_of_empty_queue_reports_nothing() {
    let ctx = TestContext::new();
    let report = drain_impl(&ctx.queue, &AcceptAll, STALE_AFTER).await.unwrap();
    assert_eq!(report, PassReport::default());
}

#[tokio::test]
async fn rejected_credentials_fail_without_spending_retries() {
    let ctx = TestContext::new();
    let item = ctx.enqueue("offer.create", json!({}));

    let err = drain_impl(&ctx.queue, &RejectAll, STALE_AFTER).await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed));

    let stored = ctx.queue.get(&item.id).unwrap().unwrap();
    assert_eq!(stored.retry_count, 0);
}

#[tokio::test]
async fn drain_leaves_fresh_claims_alone() {
    let ctx = TestContext::new();
    let item = ctx.enqueue("offer.create", json!({}));
    ctx.mark_syncing(&item.id, SystemClock.now_ms());

    let report = drain_impl(&ctx.queue, &AcceptAll, STALE_AFTER).await.unwrap();
    assert_eq!(report.processed, 0);
    let stored = ctx.queue.get(&item.id).unwrap().unwrap();
    assert_eq!(stored.status, QueueStatus::Syncing);
}

#[tokio::test]
async fn drain_recovers_abandoned_claims() {
    let ctx = TestContext::new();
    let item = ctx.enqueue("offer.create", json!({}));
    ctx.mark_syncing(&item.id, SystemClock.now_ms() - 120_000);

    let report = drain_impl(&ctx.queue, &AcceptAll, STALE_AFTER).await.unwrap();
    assert_eq!(report.synced_ids, vec![item.id.clone()]);
    assert!(ctx.queue.get(&item.id).unwrap().is_none());
}
