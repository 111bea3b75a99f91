// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use bz_core::{ConflictRecord, HistoryEntry, PassReport, QueueItem, QueueStats};
use bz_ipc::Notice;
use serde_json::Value;

/// Maximum characters of a payload shown on a list line.
const PAYLOAD_PREVIEW: usize = 60;

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Format a queue item as a single list line.
///
/// ```text
/// - [p5 pending] q-3f2a...: listing.update {"entityId":"l-1",...} (retries 2/5)
///     last error: server returned 503: unavailable
/// ```
pub fn format_item_line(item: &QueueItem) -> String {
    let mut line = format!(
        "- [p{} {}] {}: {} {}",
        item.priority,
        item.status,
        item.id,
        item.kind,
        truncate(&item.payload.to_string(), PAYLOAD_PREVIEW)
    );
    if item.retry_count > 0 {
        line.push_str(&format!(" (retries {}/{})", item.retry_count, item.max_retries));
    }
    if let Some(error) = &item.error {
        line.push_str(&format!("\n    last error: {error}"));
    }
    line
}

fn field_value(version: &serde_json::Map<String, Value>, field: &str) -> String {
    version
        .get(field)
        .map(Value::to_string)
        .unwrap_or_else(|| "-".to_string())
}

/// Format a pending conflict: a header line and one line per diverging field.
pub fn format_conflict(record: &ConflictRecord) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {}/{}",
        record.id, record.entity_type, record.entity_id
    )];
    for field in &record.conflicted_fields {
        lines.push(format!(
            "  {}: local {}, server {}",
            field,
            field_value(&record.local_version, field),
            field_value(&record.server_version, field)
        ));
    }
    lines
}

/// Coarse relative age: `12s ago`, `4m ago`, `3h ago`, `2d ago`.
pub fn format_age(now_ms: u64, then_ms: u64) -> String {
    let secs = now_ms.saturating_sub(then_ms) / 1000;
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

pub fn format_history_entry(entry: &HistoryEntry, now_ms: u64) -> String {
    format!(
        "{} {}/{} kept {} ({})",
        entry.record.id,
        entry.record.entity_type,
        entry.record.entity_id,
        entry.choice,
        format_age(now_ms, entry.resolved_at)
    )
}

pub fn format_stats(stats: &QueueStats) -> String {
    format!(
        "{} pending, {} syncing, {} failed ({} total)",
        stats.pending, stats.syncing, stats.failed, stats.total
    )
}

/// Summary of a drain.
pub fn format_report(report: &PassReport) -> Vec<String> {
    if report.processed == 0 && !report.auth_failed {
        let mut lines = vec!["Nothing to sync.".to_string()];
        if report.skipped > 0 {
            lines.push(format!(
                "{} item(s) waiting on a retry delay or a conflict",
                report.skipped
            ));
        }
        return lines;
    }

    let mut lines = vec![format!(
        "Synced {} of {} item(s)",
        report.succeeded, report.processed
    )];
    if report.failed > 0 {
        lines.push(format!(
            "{} failed ({} out of retries)",
            report.failed, report.exhausted
        ));
    }
    if !report.conflicts.is_empty() {
        lines.push(format!(
            "{} new conflict(s): {}",
            report.conflicts.len(),
            report.conflicts.join(", ")
        ));
        lines.push("  hint: run 'bazaar conflicts list' to review them".to_string());
    }
    if report.skipped > 0 {
        lines.push(format!(
            "{} item(s) waiting on a retry delay or a conflict",
            report.skipped
        ));
    }
    lines
}

pub fn format_notice(notice: &Notice) -> String {
    match notice {
        Notice::SyncQueued { id } => format!("queued {id}"),
        Notice::SyncSuccess { id } => format!("synced {id}"),
        Notice::SyncComplete {
            processed,
            succeeded,
            failed,
        } => format!("sync complete: {succeeded}/{processed} delivered, {failed} failed"),
        Notice::SyncFailed { message } => format!("sync failed: {message}"),
        Notice::PeriodicRefreshComplete { refreshed, failed } => {
            format!("refreshed {refreshed} endpoint(s), {failed} failed")
        }
        Notice::ProcessSyncQueue => "sync requested".to_string(),
    }
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
