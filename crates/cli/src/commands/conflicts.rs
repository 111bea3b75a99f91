// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use bz_core::{Choice, ClockSource, QueueItem, Resolution, SystemClock};

use crate::cli::{ConflictsCommand, OutputFormat};
use crate::config::Config;
use crate::display::{format_conflict, format_history_entry};
use crate::error::Result;
use crate::sync::Queue;

use super::print_json;

pub fn run(config: &Config, command: ConflictsCommand) -> Result<()> {
    let queue = config.open_queue()?;
    match command {
        ConflictsCommand::List { output } => list_impl(&queue, output),
        ConflictsCommand::Resolve { id, choice } => {
            let (resolution, requeued) = resolve_impl(&queue, &id, choice.into())?;
            for line in resolution_lines(&resolution, requeued.as_ref()) {
                println!("{}", line);
            }
            Ok(())
        }
        ConflictsCommand::History { output } => history_impl(&queue, output),
    }
}

pub(crate) fn list_impl(queue: &Queue, output: OutputFormat) -> Result<()> {
    let records = queue.pending_conflicts()?;
    match output {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No pending conflicts.");
            }
            for record in &records {
                for line in format_conflict(record) {
                    println!("{}", line);
                }
            }
            Ok(())
        }
    }
}

pub(crate) fn resolve_impl(
    queue: &Queue,
    id: &str,
    choice: Choice,
) -> Result<(Resolution, Option<QueueItem>)> {
    Ok(queue.resolve_conflict(id, choice)?)
}

pub(crate) fn resolution_lines(
    resolution: &Resolution,
    requeued: Option<&QueueItem>,
) -> Vec<String> {
    let record = &resolution.record;
    let mut lines = vec![format!(
        "Resolved {} ({}/{}) with the {} version",
        record.id, record.entity_type, record.entity_id, resolution.choice
    )];
    if !resolution.was_pending {
        lines.push("  (already resolved; recorded again)".to_string());
    }
    if let Some(item) = requeued {
        lines.push(format!("Re-queued local version as {}", item.id));
    }
    lines
}

pub(crate) fn history_impl(queue: &Queue, output: OutputFormat) -> Result<()> {
    let entries = queue.resolver().history()?;
    match output {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No resolved conflicts.");
            }
            let now = SystemClock.now_ms();
            for entry in &entries {
                println!("{}", format_history_entry(entry, now));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "conflicts_tests.rs"]
mod tests;
