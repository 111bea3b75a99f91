// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded buffer of outbound messages waiting for a live channel.
//!
//! When full, the oldest message is evicted to admit the newest. Crossing
//! 75% utilization logs a warning and crossing 90% logs a critical warning.

use std::collections::VecDeque;

use bz_core::ChannelMessage;

/// Utilization at which a warning is logged.
const WARN_RATIO: f64 = 0.75;
/// Utilization at which the pressure becomes critical.
const CRITICAL_RATIO: f64 = 0.90;

/// Backpressure level derived from utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pressure {
    Normal,
    Warning,
    Critical,
}

/// Outcome of [`Outbox::push`].
#[derive(Debug, Default)]
pub struct Enqueued {
    /// The message dropped to make room, if the buffer was full.
    pub evicted: Option<ChannelMessage>,
    /// Set when this push raised the pressure level.
    pub escalated: Option<Pressure>,
}

/// FIFO with drop-oldest overflow.
#[derive(Debug)]
pub struct Outbox {
    items: VecDeque<ChannelMessage>,
    capacity: usize,
    pressure: Pressure,
    dropped: usize,
}

impl Outbox {
    /// Creates an outbox holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Outbox {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            pressure: Pressure::Normal,
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages evicted since the last drain.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn utilization(&self) -> f64 {
        self.items.len() as f64 / self.capacity as f64
    }

    pub fn pressure(&self) -> Pressure {
        self.pressure
    }

    /// Appends a message, evicting the oldest if at capacity.
    pub fn push(&mut self, message: ChannelMessage) -> Enqueued {
        let mut outcome = Enqueued::default();
        if self.items.len() >= self.capacity {
            outcome.evicted = self.items.pop_front();
            self.dropped += 1;
            tracing::debug!(
                capacity = self.capacity,
                dropped = self.dropped,
                "outbox full, evicted oldest"
            );
        }
        self.items.push_back(message);
        outcome.escalated = self.update_pressure();
        outcome
    }

    /// Removes and returns every message in enqueue order.
    pub fn drain_snapshot(&mut self) -> Vec<ChannelMessage> {
        self.pressure = Pressure::Normal;
        self.dropped = 0;
        self.items.drain(..).collect()
    }

    /// Puts unsent messages back at the front, preserving their order.
    ///
    /// Returns how many were evicted to stay within capacity.
    pub fn requeue_front(&mut self, messages: Vec<ChannelMessage>) -> usize {
        for message in messages.into_iter().rev() {
            self.items.push_front(message);
        }
        let mut evicted = 0;
        while self.items.len() > self.capacity {
            self.items.pop_front();
            evicted += 1;
        }
        self.dropped += evicted;
        self.update_pressure();
        evicted
    }

    fn update_pressure(&mut self) -> Option<Pressure> {
        let utilization = self.utilization();
        let level = if utilization >= CRITICAL_RATIO {
            Pressure::Critical
        } else if utilization >= WARN_RATIO {
            Pressure::Warning
        } else {
            Pressure::Normal
        };

        let previous = self.pressure;
        self.pressure = level;
        if level <= previous {
            return None;
        }
        match level {
            Pressure::Critical => tracing::error!(
                len = self.items.len(),
                capacity = self.capacity,
                "outbox critically full, oldest messages will be dropped"
            ),
            Pressure::Warning => tracing::warn!(
                len = self.items.len(),
                capacity = self.capacity,
                "outbox above 75% capacity"
            ),
            Pressure::Normal => {}
        }
        Some(level)
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
