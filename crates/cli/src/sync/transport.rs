// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for WebSocket communication.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing
//!
//! Inbound frames are returned as raw text so the connection manager can
//! log and drop malformed ones without tearing down the channel.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bz_core::protocol::close_code;
use bz_core::ChannelMessage;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The handshake did not finish in time.
    #[error("connection timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The server refused the handshake with an HTTP auth status.
    #[error("handshake rejected with HTTP {0}")]
    Unauthorized(u16),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Something read from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame, not yet parsed.
    Text(String),
    /// The channel closed. `None` means it ended without a close frame.
    Closed(Option<u16>),
}

/// Transport trait for WebSocket-like communication.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations. `recv` must be cancel safe:
/// the connection manager races it against timers.
pub trait Transport: Send {
    /// Connect to a remote server.
    fn connect(
        &mut self,
        url: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Disconnect from the server.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Send a message to the server.
    fn send(
        &mut self,
        msg: ChannelMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Receive the next frame.
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<Inbound>> + Send + '_>>;

    /// Check if connected.
    fn is_connected(&self) -> bool;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket transport implementation using tokio-tungstenite.
pub struct WebSocketTransport {
    /// The WebSocket connection, if connected.
    ws: Option<WebSocketConnection>,
    /// Bearer token presented during the handshake.
    auth_token: Option<String>,
}

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, tokio_tungstenite::tungstenite::Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport {
            ws: None,
            auth_token: None,
        }
    }

    /// Present `token` as `Authorization: Bearer` on every handshake.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    fn connect(
        &mut self,
        url: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move {
            use futures_util::StreamExt;
            use tokio_tungstenite::tungstenite::client::IntoClientRequest;
            use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
            use tokio_tungstenite::tungstenite::http::HeaderValue;
            use tokio_tungstenite::tungstenite::Error as WsError;

            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            if let Some(token) = &self.auth_token {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }

            let (ws_stream, _) = match tokio_tungstenite::connect_async(request).await {
                Ok(pair) => pair,
                Err(WsError::Http(response))
                    if matches!(response.status().as_u16(), 401 | 403) =>
                {
                    return Err(TransportError::Unauthorized(response.status().as_u16()));
                }
                Err(e) => return Err(TransportError::ConnectionFailed(e.to_string())),
            };

            let (sink, stream) = ws_stream.split();
            self.ws = Some(WebSocketConnection { sink, stream });
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(mut ws) = self.ws.take() {
                use futures_util::SinkExt;
                if let Err(e) = ws.sink.close().await {
                    tracing::debug!(error = %e, "close handshake failed");
                }
            }
            Ok(())
        })
    }

    fn send(
        &mut self,
        msg: ChannelMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            use futures_util::SinkExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            let json = msg
                .to_json()
                .map_err(|e| TransportError::SerializationError(e.to_string()))?;

            // send() flushes, so a dead socket is reported here
            if let Err(e) = ws.sink.send(Message::Text(json.into())).await {
                self.ws = None;
                return Err(TransportError::SendFailed(e.to_string()));
            }

            Ok(())
        })
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<Inbound>> + Send + '_>> {
        Box::pin(async move {
            use futures_util::StreamExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            loop {
                match ws.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Ok(Inbound::Text(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        self.ws = None;
                        let code = frame
                            .map(|f| u16::from(f.code))
                            .unwrap_or(close_code::NO_STATUS);
                        return Ok(Inbound::Closed(Some(code)));
                    }
                    Some(Ok(_)) => {
                        // Protocol-level ping/pong and binary frames are not ours
                        continue;
                    }
                    Some(Err(e)) => {
                        self.ws = None;
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                    None => {
                        self.ws = None;
                        return Ok(Inbound::Closed(None));
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
