// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management commands.
//!
//! Commands for controlling bazaard, the background context that caches
//! requests and syncs the queue while no foreground process is running.

use bz_ipc::DaemonStatus;

use crate::cli::DaemonCommand;
use crate::config::Config;
use crate::daemon;
use crate::display::{format_notice, format_stats};
use crate::error::{Error, Result};

pub fn run(config: &Config, command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start => start(config),
        DaemonCommand::Stop => stop(config),
        DaemonCommand::Status => status(config),
        DaemonCommand::Watch => watch(config),
    }
}

fn start(config: &Config) -> Result<()> {
    match daemon::detect_daemon(&config.state_dir)? {
        Some(info) => {
            println!("Daemon is already running (PID: {})", info.pid);
        }
        None => match daemon::spawn_daemon(&config.state_dir) {
            Ok(info) => {
                println!("Daemon started (PID: {})", info.pid);
            }
            Err(e) => {
                return Err(Error::Daemon(format!("failed to start daemon: {}", e)));
            }
        },
    }
    Ok(())
}

fn stop(config: &Config) -> Result<()> {
    if daemon::detect_daemon(&config.state_dir)?.is_none() {
        println!("Daemon is not running.");
        return Ok(());
    }

    match daemon::stop_daemon_forcefully(&config.state_dir) {
        Ok(()) => println!("Daemon stopped."),
        Err(e) => println!("Failed to stop daemon: {}", e),
    }
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    match daemon::get_daemon_status(&config.state_dir) {
        Ok(Some(status)) => {
            for line in status_lines(&status) {
                println!("{}", line);
            }
        }
        Ok(None) => println!("Status: not running"),
        Err(e) => println!("Status: error ({})", e),
    }
    println!("Log: {}", daemon::get_log_path(&config.state_dir).display());
    Ok(())
}

pub(crate) fn status_lines(status: &DaemonStatus) -> Vec<String> {
    vec![
        "Status: running".to_string(),
        format!("PID: {}", status.pid),
        format!("Uptime: {}s", status.uptime_secs),
        format!(
            "Network: {}",
            if status.online { "online" } else { "offline" }
        ),
        format!("Queue: {}", format_stats(&status.queue)),
        format!("Conflicts: {} pending", status.pending_conflicts),
        format!("Cache: v{}", status.cache_version),
        format!("Watchers: {}", status.subscribers),
    ]
}

/// Prints notices pushed by the daemon until it exits.
fn watch(config: &Config) -> Result<()> {
    let client = daemon::connect_running(&config.state_dir)?.ok_or(Error::DaemonNotRunning)?;
    eprintln!("Watching daemon notices (Ctrl-C to stop)");
    for notice in client.subscribe()? {
        println!("{}", format_notice(&notice?));
    }
    eprintln!("Daemon exited.");
    Ok(())
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
