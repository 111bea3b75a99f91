// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

fn typing(n: usize) -> ChannelMessage {
    ChannelMessage::chat("conv", format!("m{n}"), 0).with_temp_id(format!("t-{n}"))
}

#[test]
fn flushes_at_max_size() {
    let mut batcher = Batcher::new(3, Duration::from_millis(50));
    let now = Instant::now();
    assert!(batcher.push(typing(0), now).is_none());
    assert!(batcher.push(typing(1), now).is_none());
    let full = batcher.push(typing(2), now).unwrap();

    assert_eq!(full.len(), 3);
    assert!(batcher.is_empty());
    assert!(batcher.deadline().is_none());
}

#[test]
fn window_starts_at_first_message() {
    let mut batcher = Batcher::new(10, Duration::from_millis(50));
    assert!(batcher.deadline().is_none());

    let start = Instant::now();
    batcher.push(typing(0), start);
    batcher.push(typing(1), start + Duration::from_millis(30));
    assert_eq!(batcher.deadline(), Some(start + Duration::from_millis(50)));

    assert_eq!(batcher.take().len(), 2);
    assert!(batcher.deadline().is_none());
}

#[test]
fn probes_and_batches_are_not_accepted() {
    assert!(!Batcher::accepts(&ChannelMessage::ping(0)));
    assert!(!Batcher::accepts(&ChannelMessage::pong(0)));
    assert!(!Batcher::accepts(&ChannelMessage::batch(vec![typing(0)], 0)));
    assert!(Batcher::accepts(&typing(0)));
}

#[test]
fn frame_wraps_groups_and_keeps_order() {
    assert!(frame(Vec::new(), 0).is_none());

    let single = frame(vec![typing(0)], 5).unwrap();
    assert_eq!(single.temp_id.as_deref(), Some("t-0"));

    let grouped = frame(vec![typing(0), typing(1), typing(2)], 5).unwrap();
    assert!(grouped.temp_id.is_some());
    match grouped.body {
        MessageBody::Batch(members) => {
            let ids: Vec<_> = members.iter().map(|m| m.temp_id.clone().unwrap()).collect();
            assert_eq!(ids, vec!["t-0", "t-1", "t-2"]);
        }
        other => panic!("expected batch, got {other:?}"),
    }
}
