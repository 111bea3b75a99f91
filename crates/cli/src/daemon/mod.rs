// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management for the bazaard process.
//!
//! The CLI reaches the background context via a Unix socket: HTTP requests
//! routed through its cache strategies, sync requests and notice streams.

mod client;
mod lifecycle;

pub use client::{DaemonClient, FetchOutcome, NoticeStream};
pub use lifecycle::{
    detect_daemon, get_daemon_status, get_log_path, get_socket_path, spawn_daemon,
    stop_daemon_forcefully, DaemonInfo, CLI_VERSION,
};

/// Connects to a running daemon and checks its version.
///
/// Returns None when no daemon is running.
pub fn connect_running(state_dir: &std::path::Path) -> crate::error::Result<Option<DaemonClient>> {
    if detect_daemon(state_dir)?.is_none() {
        return Ok(None);
    }
    let mut client = DaemonClient::connect(&get_socket_path(state_dir))?;
    client.hello()?;
    Ok(Some(client))
}
