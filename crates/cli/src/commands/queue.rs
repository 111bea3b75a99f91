// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue inspection and management.

use bz_core::{QueueItem, QueueStatus};
use serde_json::Value;

use crate::cli::{OutputFormat, QueueCommand, StatusArg};
use crate::config::Config;
use crate::display::format_item_line;
use crate::error::{Error, Result};
use crate::sync::Queue;

use super::print_json;

pub fn run(config: &Config, command: QueueCommand) -> Result<()> {
    let queue = config.open_queue()?;
    match command {
        QueueCommand::List { status, output } => list_impl(&queue, status, output),
        QueueCommand::Add {
            kind,
            payload,
            priority,
        } => {
            let item = add_impl(&queue, &kind, &payload, priority)?;
            println!("Queued {} ({}, priority {})", item.id, item.kind, item.priority);
            Ok(())
        }
        QueueCommand::RetryFailed => {
            let count = queue.retry_failed()?;
            println!("Reset {} failed item(s) to pending", count);
            Ok(())
        }
        QueueCommand::ClearFailed => {
            let count = queue.clear_failed()?;
            println!("Removed {} failed item(s)", count);
            Ok(())
        }
        QueueCommand::Promote { id } => {
            let item = queue.promote(&id)?;
            println!("Promoted {} to priority {}", item.id, item.priority);
            Ok(())
        }
        QueueCommand::Delete { id } => {
            delete_impl(&queue, &id)?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}

fn to_status(arg: StatusArg) -> QueueStatus {
    match arg {
        StatusArg::Pending => QueueStatus::Pending,
        StatusArg::Syncing => QueueStatus::Syncing,
        StatusArg::Failed => QueueStatus::Failed,
    }
}

/// Items in processing order, optionally restricted to one status.
pub(crate) fn filtered_items(queue: &Queue, status: Option<StatusArg>) -> Result<Vec<QueueItem>> {
    let items = queue.list()?;
    Ok(match status.map(to_status) {
        Some(wanted) => items.into_iter().filter(|i| i.status == wanted).collect(),
        None => items,
    })
}

pub(crate) fn list_impl(
    queue: &Queue,
    status: Option<StatusArg>,
    output: OutputFormat,
) -> Result<()> {
    let items = filtered_items(queue, status)?;
    match output {
        OutputFormat::Json => print_json(&items),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("Queue is empty.");
            }
            for item in &items {
                println!("{}", format_item_line(item));
            }
            Ok(())
        }
    }
}

/// Parses a payload argument. Payloads must be JSON objects.
pub(crate) fn parse_payload(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).map_err(|e| Error::InvalidPayload {
        reason: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(Error::InvalidPayload {
            reason: "expected a JSON object".to_string(),
        });
    }
    Ok(value)
}

pub(crate) fn add_impl(
    queue: &Queue,
    kind: &str,
    payload: &str,
    priority: u8,
) -> Result<QueueItem> {
    let kind = kind.trim();
    if kind.is_empty() {
        return Err(Error::InvalidInput("queue item kind cannot be empty".to_string()));
    }
    let payload = parse_payload(payload)?;
    Ok(queue.enqueue(kind, payload, priority)?)
}

pub(crate) fn delete_impl(queue: &Queue, id: &str) -> Result<()> {
    if queue.delete(id)? {
        Ok(())
    } else {
        Err(Error::ItemNotFound(id.to_string()))
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
