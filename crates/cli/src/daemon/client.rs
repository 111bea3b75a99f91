// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! IPC client for communicating with the bazaard daemon.

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use bz_ipc::{
    framing, DaemonRequest, DaemonResponse, DaemonStatus, HttpRequest, HttpResponse, Notice,
};

use super::lifecycle::CLI_VERSION;
use crate::error::{Error, Result};

/// Timeout for request/response exchanges. Fetches may wait on the network.
const TIMEOUT_SECS: u64 = 30;

/// Result of routing a request through the daemon.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Response(HttpResponse),
    /// Mutation persisted to the sync queue while offline.
    Queued { id: String },
}

/// A client connection to the daemon.
pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    /// Connect to the daemon at the given socket path.
    pub fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .map_err(|e| Error::Daemon(format!("failed to connect to daemon: {}", e)))?;

        stream
            .set_read_timeout(Some(Duration::from_secs(TIMEOUT_SECS)))
            .map_err(|e| Error::Daemon(format!("failed to set read timeout: {}", e)))?;
        stream
            .set_write_timeout(Some(Duration::from_secs(TIMEOUT_SECS)))
            .map_err(|e| Error::Daemon(format!("failed to set write timeout: {}", e)))?;

        Ok(DaemonClient { stream })
    }

    fn request(&mut self, request: DaemonRequest) -> Result<DaemonResponse> {
        framing::write_message(&mut self.stream, &request)?;
        match framing::read_message(&mut self.stream)? {
            DaemonResponse::Error { message } => Err(Error::Daemon(message)),
            response => Ok(response),
        }
    }

    /// Checks that the daemon speaks this CLI's version.
    pub fn hello(&mut self) -> Result<()> {
        match self.request(DaemonRequest::Hello {
            version: CLI_VERSION.to_string(),
        })? {
            DaemonResponse::Hello { version } if version == CLI_VERSION => Ok(()),
            DaemonResponse::Hello { version } => Err(Error::DaemonVersionMismatch {
                daemon_version: version,
                cli_version: CLI_VERSION.to_string(),
            }),
            other => Err(unexpected(other)),
        }
    }

    pub fn status(&mut self) -> Result<DaemonStatus> {
        match self.request(DaemonRequest::Status)? {
            DaemonResponse::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Routes an HTTP request through the daemon's cache strategies.
    pub fn fetch(&mut self, request: HttpRequest) -> Result<FetchOutcome> {
        match self.request(DaemonRequest::Fetch { request })? {
            DaemonResponse::Fetched { response } => Ok(FetchOutcome::Response(response)),
            DaemonResponse::Queued { id } => Ok(FetchOutcome::Queued { id }),
            other => Err(unexpected(other)),
        }
    }

    /// Asks the daemon to drain the sync queue. Returns once scheduled.
    pub fn sync_now(&mut self) -> Result<()> {
        match self.request(DaemonRequest::SyncNow)? {
            DaemonResponse::SyncStarted => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Turns this connection into a stream of notices.
    pub fn subscribe(mut self) -> Result<NoticeStream> {
        match self.request(DaemonRequest::Subscribe)? {
            DaemonResponse::Subscribed => {
                self.stream.set_read_timeout(None)?;
                Ok(NoticeStream {
                    stream: self.stream,
                })
            }
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: DaemonResponse) -> Error {
    Error::Daemon(format!("unexpected response: {:?}", response))
}

/// Blocking iterator over pushed notices. Ends when the daemon hangs up.
pub struct NoticeStream {
    stream: UnixStream,
}

impl Iterator for NoticeStream {
    type Item = Result<Notice>;

    fn next(&mut self) -> Option<Self::Item> {
        match framing::read_message(&mut self.stream) {
            Ok(DaemonResponse::Notice { notice }) => Some(Ok(notice)),
            Ok(other) => Some(Err(unexpected(other))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => None,
            Err(e) => Some(Err(Error::Io(e))),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
