// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bz-core: shared library for the bazaar sync client
//!
//! This crate provides the channel protocol, the durable queue store, the
//! sync queue processor and the conflict resolver used by both the `bazaar`
//! CLI and the `bazaard` daemon.

pub mod api;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod error;
pub mod jsonl;
pub mod protocol;
pub mod queue_item;
pub mod store;
pub mod sync_queue;

pub use api::{ApiError, HttpApi, HttpRequest, HttpResponse};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use config::Settings;
pub use conflict::{
    Choice, ConflictRecord, ConflictResolver, EntitySnapshot, HistoryEntry, Reconciliation,
    Resolution,
};
pub use error::{Advisory, Error, ErrorClass, Result};
pub use protocol::{ChannelMessage, CloseKind, MessageBody, ProtocolError};
pub use queue_item::{EntityKey, Mutation, QueueItem, QueueStatus};
pub use store::{ConflictStore, QueueStore, SqliteStore};
pub use sync_queue::{
    MutationSender, PassReport, QueueStats, SendError, SyncAck, SyncOptions, SyncQueue,
};
