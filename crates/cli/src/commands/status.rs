// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use bz_core::QueueStats;
use bz_ipc::DaemonStatus;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::daemon;
use crate::display::format_stats;
use crate::error::Result;
use crate::sync::Queue;

use super::print_json;

/// JSON output structure for the status command.
#[derive(Debug, Serialize)]
pub(crate) struct StatusJson {
    daemon_running: bool,
    /// Last health probe result. Unknown without a daemon.
    #[serde(skip_serializing_if = "Option::is_none")]
    online: Option<bool>,
    queue: QueueStats,
    pending_conflicts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_version: Option<u32>,
}

pub fn run(config: &Config, output: OutputFormat) -> Result<()> {
    let queue = config.open_queue()?;
    let daemon_status = match daemon::get_daemon_status(&config.state_dir) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(error = %e, "daemon status unavailable");
            None
        }
    };
    let summary = collect(&queue, daemon_status.as_ref())?;
    match output {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Text => {
            for line in summary_lines(&summary) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

pub(crate) fn collect(queue: &Queue, daemon_status: Option<&DaemonStatus>) -> Result<StatusJson> {
    Ok(StatusJson {
        daemon_running: daemon_status.is_some(),
        online: daemon_status.map(|s| s.online),
        queue: queue.stats()?,
        pending_conflicts: queue.pending_conflicts()?.len(),
        cache_version: daemon_status.map(|s| s.cache_version),
    })
}

pub(crate) fn summary_lines(summary: &StatusJson) -> Vec<String> {
    let connectivity = match summary.online {
        Some(true) => "online",
        Some(false) => "offline",
        None => "unknown (daemon not running)",
    };
    let mut lines = vec![
        format!("Connectivity: {}", connectivity),
        format!("Queue: {}", format_stats(&summary.queue)),
        format!("Conflicts: {} pending", summary.pending_conflicts),
    ];
    if let Some(version) = summary.cache_version {
        lines.push(format!("Cache: v{}", version));
    }
    if summary.pending_conflicts > 0 {
        lines.push("  hint: run 'bazaar conflicts list' to review them".to_string());
    }
    lines
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
