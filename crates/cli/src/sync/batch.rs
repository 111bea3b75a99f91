// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound batching.
//!
//! Batchable messages accumulate until the buffer reaches its maximum size
//! or the window since the first buffered message elapses.

use std::time::Duration;

use bz_core::protocol::new_temp_id;
use bz_core::{ChannelMessage, MessageBody};
use tokio::time::Instant;

#[derive(Debug)]
pub struct Batcher {
    buffer: Vec<ChannelMessage>,
    max_size: usize,
    window: Duration,
    opened_at: Option<Instant>,
}

impl Batcher {
    pub fn new(max_size: usize, window: Duration) -> Self {
        Batcher {
            buffer: Vec::new(),
            max_size: max_size.max(1),
            window,
            opened_at: None,
        }
    }

    /// True for messages that may be grouped. Probes and batches never are.
    pub fn accepts(message: &ChannelMessage) -> bool {
        !message.body.is_probe() && !matches!(message.body, MessageBody::Batch(_))
    }

    /// Buffers a message. Returns the buffered group once it is full.
    pub fn push(&mut self, message: ChannelMessage, now: Instant) -> Option<Vec<ChannelMessage>> {
        if self.buffer.is_empty() {
            self.opened_at = Some(now);
        }
        self.buffer.push(message);
        if self.buffer.len() >= self.max_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// When the open window closes, if anything is buffered.
    pub fn deadline(&self) -> Option<Instant> {
        self.opened_at.map(|at| at + self.window)
    }

    /// Empties the buffer.
    pub fn take(&mut self) -> Vec<ChannelMessage> {
        self.opened_at = None;
        std::mem::take(&mut self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Wraps a group into one frame. A single message is sent as itself.
pub fn frame(mut members: Vec<ChannelMessage>, timestamp: u64) -> Option<ChannelMessage> {
    match members.len() {
        0 => None,
        1 => members.pop(),
        _ => Some(ChannelMessage::batch(members, timestamp).with_temp_id(new_temp_id())),
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
