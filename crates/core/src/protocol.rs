// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel protocol messages exchanged over the persistent connection.
//!
//! On the wire every frame is a JSON envelope:
//!
//! ```text
//! { "type": "message", "tempId": "…", "timestamp": 1712345678901, "payload": { … } }
//! { "type": "batch", "tempId": "…", "timestamp": …, "messages": [ <envelope>, … ] }
//! ```
//!
//! In memory the envelope is decoded into [`ChannelMessage`], whose
//! [`MessageBody`] is a tagged union over the known kinds with an
//! [`MessageBody::Unknown`] fallback so newer servers do not break older clients.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire names for the `type` field.
pub mod kind {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const ACK: &str = "ack";
    pub const BATCH: &str = "batch";
    pub const MESSAGE: &str = "message";
    pub const TYPING: &str = "typing";
    pub const READ: &str = "read";
}

/// WebSocket close codes with special meaning to the client.
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const NO_STATUS: u16 = 1005;
    pub const ABNORMAL: u16 = 1006;
    /// Application-reserved code: the server rejected our credentials.
    pub const AUTH_FAILED: u16 = 4001;
}

/// How the client should react to a close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Orderly shutdown. Do not reconnect.
    Normal,
    /// Credentials rejected. Terminal; the caller must refresh them.
    AuthenticationFailed,
    /// Anything else. Reconnect with backoff.
    Abnormal,
}

impl CloseKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            close_code::NORMAL | close_code::GOING_AWAY | close_code::NO_STATUS => {
                CloseKind::Normal
            }
            close_code::AUTH_FAILED => CloseKind::AuthenticationFailed,
            _ => CloseKind::Abnormal,
        }
    }

    pub fn should_reconnect(&self) -> bool {
        *self == CloseKind::Abnormal
    }
}

/// Error decoding an inbound frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame has no type")]
    MissingType,

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

/// Payload of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub conversation_id: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
}

/// Payload of a typing indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: String,
    pub is_typing: bool,
}

/// Payload of a read receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptPayload {
    pub conversation_id: String,
    pub message_id: String,
}

/// The typed body of a channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Liveness probe.
    Ping,
    /// Answer to a probe.
    Pong,
    /// Server acknowledgment. The envelope's `tempId` names the acked message.
    Ack,
    /// Ordered group of messages sent as one frame.
    Batch(Vec<ChannelMessage>),
    Chat(ChatPayload),
    Typing(TypingPayload),
    ReadReceipt(ReadReceiptPayload),
    /// A kind this build does not know about.
    Unknown { kind: String, payload: Value },
}

impl MessageBody {
    /// Returns the wire `type` for this body.
    pub fn kind(&self) -> &str {
        match self {
            MessageBody::Ping => kind::PING,
            MessageBody::Pong => kind::PONG,
            MessageBody::Ack => kind::ACK,
            MessageBody::Batch(_) => kind::BATCH,
            MessageBody::Chat(_) => kind::MESSAGE,
            MessageBody::Typing(_) => kind::TYPING,
            MessageBody::ReadReceipt(_) => kind::READ,
            MessageBody::Unknown { kind, .. } => kind,
        }
    }

    /// Liveness probes never carry a tempId and are never batched.
    pub fn is_probe(&self) -> bool {
        matches!(self, MessageBody::Ping | MessageBody::Pong)
    }

    /// Control frames are consumed by the connection layer, not subscribers.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            MessageBody::Ping | MessageBody::Pong | MessageBody::Ack | MessageBody::Batch(_)
        )
    }
}

/// One frame on the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    /// Client-generated token for deduplication and ack matching.
    pub temp_id: Option<String>,
    /// Milliseconds since Unix epoch.
    pub timestamp: u64,
    pub body: MessageBody,
}

/// Generates a fresh tempId.
pub fn new_temp_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The JSON shape of a frame.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temp_id: Option<String>,
    #[serde(default)]
    timestamp: u64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<Envelope>>,
}

impl ChannelMessage {
    /// Creates a message without a tempId.
    pub fn new(body: MessageBody, timestamp: u64) -> Self {
        ChannelMessage {
            temp_id: None,
            timestamp,
            body,
        }
    }

    /// Attaches a tempId.
    pub fn with_temp_id(mut self, temp_id: impl Into<String>) -> Self {
        self.temp_id = Some(temp_id.into());
        self
    }

    pub fn ping(timestamp: u64) -> Self {
        Self::new(MessageBody::Ping, timestamp)
    }

    pub fn pong(timestamp: u64) -> Self {
        Self::new(MessageBody::Pong, timestamp)
    }

    /// Acknowledgment of the message carrying `temp_id`.
    pub fn ack(temp_id: impl Into<String>, timestamp: u64) -> Self {
        Self::new(MessageBody::Ack, timestamp).with_temp_id(temp_id)
    }

    pub fn batch(messages: Vec<ChannelMessage>, timestamp: u64) -> Self {
        Self::new(MessageBody::Batch(messages), timestamp)
    }

    pub fn chat(
        conversation_id: impl Into<String>,
        body: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self::new(
            MessageBody::Chat(ChatPayload {
                conversation_id: conversation_id.into(),
                body: body.into(),
                sender_id: None,
            }),
            timestamp,
        )
    }

    /// Returns the wire `type`.
    pub fn kind(&self) -> &str {
        self.body.kind()
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope()?)
    }

    /// Deserializes a message from JSON.
    ///
    /// Malformed batch members are dropped with a warning; the rest of the
    /// batch survives.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(s).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Self::from_envelope(envelope)
    }

    fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        let (payload, messages) = match &self.body {
            MessageBody::Ping | MessageBody::Pong | MessageBody::Ack => (Value::Null, None),
            MessageBody::Batch(members) => {
                let members = members
                    .iter()
                    .map(ChannelMessage::to_envelope)
                    .collect::<Result<Vec<_>, _>>()?;
                (Value::Null, Some(members))
            }
            MessageBody::Chat(p) => (serde_json::to_value(p)?, None),
            MessageBody::Typing(p) => (serde_json::to_value(p)?, None),
            MessageBody::ReadReceipt(p) => (serde_json::to_value(p)?, None),
            MessageBody::Unknown { payload, .. } => (payload.clone(), None),
        };

        Ok(Envelope {
            kind: Some(self.kind().to_string()),
            temp_id: self.temp_id.clone(),
            timestamp: self.timestamp,
            payload,
            messages,
        })
    }

    fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let kind = match envelope.kind {
            Some(k) if !k.is_empty() => k,
            _ => return Err(ProtocolError::MissingType),
        };

        let body = match kind.as_str() {
            kind::PING => MessageBody::Ping,
            kind::PONG => MessageBody::Pong,
            kind::ACK => MessageBody::Ack,
            kind::BATCH => {
                let mut members = Vec::new();
                for member in envelope.messages.unwrap_or_default() {
                    match Self::from_envelope(member) {
                        Ok(msg) => members.push(msg),
                        Err(e) => tracing::warn!(error = %e, "dropping malformed batch member"),
                    }
                }
                MessageBody::Batch(members)
            }
            kind::MESSAGE => MessageBody::Chat(decode_payload(&kind, envelope.payload)?),
            kind::TYPING => MessageBody::Typing(decode_payload(&kind, envelope.payload)?),
            kind::READ => MessageBody::ReadReceipt(decode_payload(&kind, envelope.payload)?),
            _ => MessageBody::Unknown {
                kind,
                payload: envelope.payload,
            },
        };

        Ok(ChannelMessage {
            temp_id: envelope.temp_id,
            timestamp: envelope.timestamp,
            body,
        })
    }
}

fn decode_payload<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
