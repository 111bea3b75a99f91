// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket server.
//!
//! One task per connection. A connection carries any number of
//! request/response exchanges until the client hangs up, or turns into a
//! notice stream after `Subscribe`.

use bz_ipc::{framing_async, DaemonRequest, DaemonResponse};
use tokio::io::AsyncReadExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::DaemonState;

/// Accepts connections until shutdown is requested.
pub async fn run(listener: UnixListener, state: DaemonState) {
    loop {
        tokio::select! {
            _ = state.cancelled() => break,
            accept = listener.accept() => match accept {
                Ok((stream, _)) => {
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            warn!("connection error: {}", e);
                        }
                    });
                }
                Err(e) => warn!("failed to accept connection: {}", e),
            }
        }
    }
    info!("server stopped accepting connections");
}

pub(crate) async fn handle_connection(
    stream: UnixStream,
    state: DaemonState,
) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    loop {
        let request: DaemonRequest = match framing_async::read_message(&mut reader).await {
            Ok(request) => request,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        debug!(?request, "request");

        if request == DaemonRequest::Subscribe {
            return stream_notices(reader, writer, state).await;
        }

        let response = handle_request(request, &state).await;
        framing_async::write_message(&mut writer, &response).await?;
        if response == DaemonResponse::ShuttingDown {
            info!("shutdown requested");
            state.shutdown();
            return Ok(());
        }
    }
}

async fn handle_request(request: DaemonRequest, state: &DaemonState) -> DaemonResponse {
    match request {
        DaemonRequest::Ping => DaemonResponse::Pong,
        DaemonRequest::Hello { version } => {
            debug!(client_version = %version, "hello");
            DaemonResponse::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            }
        }
        DaemonRequest::Status => match state.status() {
            Ok(status) => DaemonResponse::Status(status),
            Err(e) => error_response(e),
        },
        DaemonRequest::Shutdown => DaemonResponse::ShuttingDown,
        DaemonRequest::Fetch { request } => match state.router().handle(request).await {
            Ok(response) => response,
            Err(e) => error_response(e),
        },
        DaemonRequest::SyncNow => {
            state.request_sync();
            DaemonResponse::SyncStarted
        }
        DaemonRequest::Subscribe => DaemonResponse::Error {
            message: "subscribe must be the last request on a connection".to_string(),
        },
    }
}

fn error_response(error: impl std::fmt::Display) -> DaemonResponse {
    DaemonResponse::Error {
        message: error.to_string(),
    }
}

/// Forwards notices until the client hangs up or the daemon stops.
async fn stream_notices(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    state: DaemonState,
) -> std::io::Result<()> {
    let mut notices = state.subscribe();
    framing_async::write_message(&mut writer, &DaemonResponse::Subscribed).await?;
    info!(subscribers = state.subscribers(), "subscriber attached");

    let mut probe = [0u8; 1];
    loop {
        tokio::select! {
            _ = state.cancelled() => break,
            read = reader.read(&mut probe) => match read {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            },
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    let response = DaemonResponse::Notice { notice };
                    framing_async::write_message(&mut writer, &response).await?;
                }
                Err(RecvError::Lagged(n)) => warn!("subscriber lagged by {} notices", n),
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("subscriber detached");
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
