// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time channel and offline resilience.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ SyncClient  │────►│ ConnectionManager │────►│  Transport  │────►│ Marketplace │
//! │             │◄────│   (actor task)    │◄────│   (trait)   │◄────│   server    │
//! └─────────────┘     └───────────────────┘     └─────────────┘     └─────────────┘
//!        │                 │ outbox, batcher,
//!        ▼                 │ dedup, heartbeat
//! ┌─────────────┐
//! │  SyncQueue  │  (durable mutations, bz-core)
//! └─────────────┘
//! ```
//!
//! - Heartbeat probes with a pong deadline
//! - Reconnect with jittered exponential backoff, paused while hidden
//! - Bounded drop-oldest outbox flushed on reconnect
//! - Outbound batching and inbound duplicate suppression
//! - Injectable transport trait for testing

pub mod backoff;
pub mod batch;
mod client;
mod connection;
pub mod dedup;
pub mod outbox;
mod transport;

pub use client::{Delivery, Queue, SyncClient, CHAT_READ_KIND, CHAT_SEND_KIND};
pub use connection::{ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState};
pub use transport::{Inbound, Transport, TransportError, WebSocketTransport};

#[cfg(test)]
pub(crate) mod test_helpers;
