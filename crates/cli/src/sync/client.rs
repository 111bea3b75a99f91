// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync client: the real-time channel plus the durable mutation queue.
//!
//! Chat traffic goes over the channel while it is up and falls back to the
//! sync queue while it is down. Entity mutations always go through the queue
//! so they survive restarts and pass through conflict reconciliation.

use std::sync::Arc;

use bz_core::protocol::{ChatPayload, ReadReceiptPayload, TypingPayload};
use bz_core::queue_item::{PRIORITY_BULK, PRIORITY_NORMAL};
use bz_core::sync_queue::mutation_payload;
use bz_core::{
    MessageBody, MutationSender, PassReport, QueueItem, SqliteStore, SyncQueue, SystemClock,
};
use serde_json::{Map, Value};

use super::connection::{ConnectionManager, ConnectionState};
use crate::error::Result;

/// Queue kind for chat messages sent while offline.
pub const CHAT_SEND_KIND: &str = "chat.send";
/// Queue kind for read receipts recorded while offline.
pub const CHAT_READ_KIND: &str = "chat.read";

/// The queue as used by the CLI.
pub type Queue = SyncQueue<SqliteStore, SystemClock>;

/// How a message left the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Sent on the live channel under this tempId.
    Live { temp_id: String },
    /// Persisted to the sync queue under this item id.
    Queued { id: String },
}

pub struct SyncClient {
    connection: ConnectionManager,
    queue: Arc<Queue>,
}

impl SyncClient {
    pub fn new(connection: ConnectionManager, queue: Arc<Queue>) -> Self {
        SyncClient { connection, queue }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    fn is_live(&self) -> bool {
        self.connection.state() == ConnectionState::Connected
    }

    /// Sends a chat message, queueing it durably when the channel is down.
    pub fn send_chat(&self, conversation_id: &str, body: &str) -> Result<Delivery> {
        let payload = ChatPayload {
            conversation_id: conversation_id.to_string(),
            body: body.to_string(),
            sender_id: None,
        };
        if self.is_live() {
            if let Some(temp_id) = self.connection.send(MessageBody::Chat(payload.clone())) {
                return Ok(Delivery::Live { temp_id });
            }
        }
        let item = self
            .queue
            .enqueue(CHAT_SEND_KIND, serde_json::to_value(&payload)?, PRIORITY_NORMAL)?;
        Ok(Delivery::Queued { id: item.id })
    }

    /// Typing indicators are ephemeral. Returns false when dropped offline.
    pub fn send_typing(&self, conversation_id: &str, is_typing: bool) -> bool {
        if !self.is_live() {
            return false;
        }
        self.connection
            .send_batched(MessageBody::Typing(TypingPayload {
                conversation_id: conversation_id.to_string(),
                is_typing,
            }))
            .is_some()
    }

    /// Marks a message read. Receipts recorded offline sync at bulk priority.
    pub fn mark_read(&self, conversation_id: &str, message_id: &str) -> Result<Delivery> {
        let payload = ReadReceiptPayload {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        };
        if self.is_live() {
            if let Some(temp_id) = self
                .connection
                .send_batched(MessageBody::ReadReceipt(payload.clone()))
            {
                return Ok(Delivery::Live { temp_id });
            }
        }
        let item = self
            .queue
            .enqueue(CHAT_READ_KIND, serde_json::to_value(&payload)?, PRIORITY_BULK)?;
        Ok(Delivery::Queued { id: item.id })
    }

    /// Queues an entity mutation as `{entity_type}.update`.
    pub fn submit_mutation(
        &self,
        entity_type: &str,
        entity_id: &str,
        fields: Map<String, Value>,
        priority: u8,
    ) -> Result<QueueItem> {
        let kind = format!("{entity_type}.update");
        let payload = mutation_payload(entity_type, entity_id, fields);
        Ok(self.queue.enqueue(&kind, payload, priority)?)
    }

    /// Runs processing passes until nothing due remains.
    pub async fn drain(&self, sender: &dyn MutationSender) -> Result<PassReport> {
        let report = self.queue.drain(sender).await?;
        if report.processed > 0 {
            tracing::info!(
                succeeded = report.succeeded,
                failed = report.failed,
                conflicts = report.conflicts.len(),
                "sync queue drained"
            );
        }
        Ok(report)
    }

    /// Closes the channel. Queued items stay on disk.
    pub async fn shutdown(&self) {
        self.connection.close().await;
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
