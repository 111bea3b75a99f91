// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared IPC protocol for CLI-daemon communication.
//!
//! This crate defines the message types and framing protocol used between
//! the `bazaar` CLI and the `bazaard` daemon. Messages are serialized as JSON
//! with length-prefixed framing.

use serde::{Deserialize, Serialize};

pub use bz_core::{HttpRequest, HttpResponse, QueueStats};

// ============================================================================
// Protocol types
// ============================================================================

/// Request sent from CLI to daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DaemonRequest {
    /// Get daemon status.
    Status,
    /// Graceful shutdown.
    Shutdown,
    /// Ping to check if daemon is alive.
    Ping,
    /// Version handshake request.
    Hello { version: String },
    /// Route an HTTP request through the daemon's cache strategies.
    Fetch { request: HttpRequest },
    /// Drain the sync queue now.
    SyncNow,
    /// Turn this connection into a notice stream.
    Subscribe,
}

/// Response sent from daemon to CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DaemonResponse {
    /// Status response.
    Status(DaemonStatus),
    /// Shutdown acknowledged.
    ShuttingDown,
    /// Pong response.
    Pong,
    /// Error response.
    Error { message: String },
    /// Version handshake response.
    Hello { version: String },
    /// Response served from network or cache.
    Fetched { response: HttpResponse },
    /// The request was a mutation that could not reach the server; it was
    /// persisted to the sync queue instead.
    Queued { id: String },
    /// A sync pass was scheduled.
    SyncStarted,
    /// Subscription accepted. Notices follow on this connection.
    Subscribed,
    /// A pushed notice on a subscribed connection.
    Notice { notice: Notice },
}

/// Broadcast from the daemon to every subscribed foreground process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notice {
    /// A mutation was queued while offline.
    SyncQueued { id: String },
    /// One queued mutation reached the server.
    SyncSuccess { id: String },
    /// A drain finished.
    SyncComplete {
        processed: usize,
        succeeded: usize,
        failed: usize,
    },
    /// A drain could not run.
    SyncFailed { message: String },
    /// Periodic pre-fetch finished.
    PeriodicRefreshComplete { refreshed: usize, failed: usize },
    /// A drain was requested and is about to run.
    ProcessSyncQueue,
}

/// Daemon status information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonStatus {
    /// Current daemon PID.
    pub pid: u32,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Result of the last health probe.
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub queue: QueueStats,
    #[serde(default)]
    pub pending_conflicts: usize,
    #[serde(default)]
    pub cache_version: u32,
    #[serde(default)]
    pub subscribers: usize,
}

impl DaemonStatus {
    /// Create a new status with the given parameters.
    pub fn new(pid: u32, uptime_secs: u64) -> Self {
        Self {
            pid,
            uptime_secs,
            online: false,
            queue: QueueStats::default(),
            pending_conflicts: 0,
            cache_version: 0,
            subscribers: 0,
        }
    }
}

// ============================================================================
// Message framing
// ============================================================================

/// Maximum message size (1MB) to prevent malformed messages from causing hangs.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

fn encode<T: Serialize>(message: &T) -> std::io::Result<Vec<u8>> {
    let json = serde_json::to_vec(message)
        .map_err(|e| std::io::Error::other(format!("serialize error: {}", e)))?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::other(format!(
            "message too large: {} bytes (max {})",
            json.len(),
            MAX_MESSAGE_SIZE
        )));
    }
    let len = u32::try_from(json.len()).map_err(|_| std::io::Error::other("message too large"))?;
    let mut frame = Vec::with_capacity(4 + json.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

fn check_len(len_buf: [u8; 4]) -> std::io::Result<usize> {
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::other(format!(
            "message too large: {} bytes (max {})",
            len, MAX_MESSAGE_SIZE
        )));
    }
    Ok(len)
}

fn decode<T: serde::de::DeserializeOwned>(buf: &[u8]) -> std::io::Result<T> {
    serde_json::from_slice(buf)
        .map_err(|e| std::io::Error::other(format!("deserialize error: {}", e)))
}

/// IPC message framing over blocking streams.
///
/// Messages are framed as:
/// - 4 bytes: message length (big-endian u32)
/// - N bytes: JSON-encoded message
pub mod framing {
    use std::io::{Read, Write};

    use serde::de::DeserializeOwned;
    use serde::Serialize;

    /// Write a serializable message to the given writer.
    pub fn write_message<W: Write, T: Serialize>(
        writer: &mut W,
        message: &T,
    ) -> std::io::Result<()> {
        writer.write_all(&super::encode(message)?)?;
        writer.flush()
    }

    /// Read a deserializable message from the given reader.
    pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> std::io::Result<T> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = super::check_len(len_buf)?;

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        super::decode(&buf)
    }
}

/// The same framing over tokio streams, used by the daemon and by
/// long-lived subscriptions.
pub mod framing_async {
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    pub async fn write_message<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
        T: Serialize,
    {
        writer.write_all(&super::encode(message)?).await?;
        writer.flush().await
    }

    pub async fn read_message<R, T>(reader: &mut R) -> std::io::Result<T>
    where
        R: AsyncRead + Unpin,
        T: DeserializeOwned,
    {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = super::check_len(len_buf)?;

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        super::decode(&buf)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
