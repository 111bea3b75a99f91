// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: spawn, detect, cleanup.
//!
//! The daemon (bazaard) is spawned as a background process and communicates via Unix socket.
//! PID and socket files are stored in the state directory (~/.local/state/bazaar/).

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use bz_ipc::{framing, DaemonRequest, DaemonResponse, DaemonStatus};

use crate::env;
use crate::error::{Error, Result};

/// Socket filename within the state directory.
const SOCKET_NAME: &str = "daemon.sock";
/// PID filename within the state directory.
const PID_NAME: &str = "daemon.pid";
/// Log filename written by the daemon.
const LOG_NAME: &str = "daemon.log";
/// Daemon executable name.
const DAEMON_BINARY: &str = "bazaard";

/// CLI version for the handshake.
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Information about a running daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonInfo {
    pub pid: u32,
}

pub fn get_socket_path(state_dir: &Path) -> PathBuf {
    state_dir.join(SOCKET_NAME)
}

pub fn get_pid_path(state_dir: &Path) -> PathBuf {
    state_dir.join(PID_NAME)
}

pub fn get_log_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOG_NAME)
}

fn short_lived(stream: &UnixStream, secs: u64) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(secs)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(secs)));
}

/// Detect if a daemon is running for the given state directory.
///
/// Returns Some(DaemonInfo) if a daemon is running and responding,
/// None otherwise. Cleans up stale PID/socket files if found.
pub fn detect_daemon(state_dir: &Path) -> Result<Option<DaemonInfo>> {
    let socket_path = get_socket_path(state_dir);
    let pid_path = get_pid_path(state_dir);

    if !socket_path.exists() {
        if pid_path.exists() {
            let _ = fs::remove_file(&pid_path);
        }
        return Ok(None);
    }

    let Ok(mut stream) = UnixStream::connect(&socket_path) else {
        cleanup_stale_files(state_dir);
        return Ok(None);
    };
    short_lived(&stream, 2);

    if framing::write_message(&mut stream, &DaemonRequest::Ping).is_err() {
        cleanup_stale_files(state_dir);
        return Ok(None);
    }

    match framing::read_message(&mut stream) {
        Ok(DaemonResponse::Pong) => match read_pid_file(&pid_path) {
            Some(pid) if pid > 0 => Ok(Some(DaemonInfo { pid })),
            // PID file not written yet; the daemon may still be starting
            _ => Ok(None),
        },
        _ => {
            cleanup_stale_files(state_dir);
            Ok(None)
        }
    }
}

/// Get daemon status, or None when no daemon is listening.
pub fn get_daemon_status(state_dir: &Path) -> Result<Option<DaemonStatus>> {
    let socket_path = get_socket_path(state_dir);
    if !socket_path.exists() {
        return Ok(None);
    }

    let Ok(mut stream) = UnixStream::connect(&socket_path) else {
        cleanup_stale_files(state_dir);
        return Ok(None);
    };
    short_lived(&stream, 5);

    framing::write_message(&mut stream, &DaemonRequest::Status)?;
    match framing::read_message(&mut stream)? {
        DaemonResponse::Status(status) => Ok(Some(status)),
        DaemonResponse::Error { message } => Err(Error::Daemon(message)),
        other => Err(Error::Daemon(format!("unexpected response: {other:?}"))),
    }
}

/// Send a shutdown request to the daemon.
pub fn stop_daemon(state_dir: &Path) -> Result<()> {
    let socket_path = get_socket_path(state_dir);
    if !socket_path.exists() {
        return Err(Error::DaemonNotRunning);
    }

    let mut stream = UnixStream::connect(&socket_path)?;
    short_lived(&stream, 2);

    framing::write_message(&mut stream, &DaemonRequest::Shutdown)?;
    match framing::read_message(&mut stream)? {
        DaemonResponse::ShuttingDown => Ok(()),
        DaemonResponse::Error { message } => Err(Error::Daemon(message)),
        other => Err(Error::Daemon(format!("unexpected response: {other:?}"))),
    }
}

/// Find the bazaard binary.
fn find_daemon_binary() -> PathBuf {
    if let Some(path) = env::daemon_binary() {
        return path;
    }

    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name(DAEMON_BINARY);
        if sibling.exists() {
            return sibling;
        }
    }

    PathBuf::from(DAEMON_BINARY)
}

/// Spawn a new daemon process for the given state directory.
///
/// The daemon holds an flock on `daemon.lock` in the state directory, so
/// racing spawns leave exactly one instance running.
pub fn spawn_daemon(state_dir: &Path) -> Result<DaemonInfo> {
    if let Some(info) = detect_daemon(state_dir)? {
        return Ok(info);
    }

    fs::create_dir_all(state_dir)?;
    let binary = find_daemon_binary();

    let mut child = Command::new(&binary)
        .arg("--state-dir")
        .arg(state_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::Daemon(format!(
                "failed to start {} ({}): {}",
                DAEMON_BINARY,
                binary.display(),
                e
            ))
        })?;

    // The daemon prints READY once its socket is bound
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) if line == "READY" => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    for _ in 0..150 {
        if let Ok(Some(status)) = child.try_wait() {
            let mut output = String::new();
            if let Some(mut stderr) = child.stderr.take() {
                let _ = stderr.read_to_string(&mut output);
            }
            return Err(Error::Daemon(format!(
                "daemon process exited with status: {}\n{}",
                status,
                output.trim()
            )));
        }

        if let Some(info) = detect_daemon(state_dir)? {
            return Ok(info);
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    Err(Error::Daemon(
        "daemon failed to start: could not connect after multiple attempts".to_string(),
    ))
}

/// Clean up stale socket and PID files.
fn cleanup_stale_files(state_dir: &Path) {
    let _ = fs::remove_file(get_socket_path(state_dir));
    let _ = fs::remove_file(get_pid_path(state_dir));
}

fn read_pid_file(pid_path: &Path) -> Option<u32> {
    fs::read_to_string(pid_path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Stop the daemon, killing it if graceful shutdown fails.
pub fn stop_daemon_forcefully(state_dir: &Path) -> Result<()> {
    let pid = read_pid_file(&get_pid_path(state_dir));

    if stop_daemon(state_dir).is_ok() {
        if let Some(pid) = pid {
            wait_for_process_exit(pid, Duration::from_secs(2));
        }
        cleanup_stale_files(state_dir);
        return Ok(());
    }

    if let Some(pid) = pid {
        tracing::warn!(pid, "graceful shutdown failed, killing daemon");
        let _ = Command::new("kill").arg("-9").arg(pid.to_string()).output();
        std::thread::sleep(Duration::from_millis(100));
    }

    cleanup_stale_files(state_dir);
    Ok(())
}

fn wait_for_process_exit(pid: u32, timeout: Duration) {
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        let result = Command::new("kill").arg("-0").arg(pid.to_string()).output();
        match result {
            Ok(output) if !output.status.success() => return,
            Err(_) => return,
            _ => {}
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
