// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Deliver queued mutations now.

use std::time::Duration;

use bz_core::{MutationSender, PassReport};

use crate::config::Config;
use crate::daemon;
use crate::display::format_report;
use crate::error::{Error, Result};
use crate::sync::Queue;

use super::block_on;

pub fn run(config: &Config, local: bool) -> Result<()> {
    if !local {
        if let Some(mut client) = daemon::connect_running(&config.state_dir)? {
            client.sync_now()?;
            println!("Sync started in the daemon.");
            println!("  hint: follow progress with 'bazaar daemon watch'");
            return Ok(());
        }
    }

    let queue = config.open_queue()?;
    let api = config.api()?;
    // A claim outlives every request of the pass that made it
    let stale_after = config.settings.server.request_timeout() * 2;
    let report = block_on(drain_impl(&queue, &api, stale_after))??;
    for line in format_report(&report) {
        println!("{}", line);
    }
    Ok(())
}

/// Drains the queue in this process.
///
/// Items claimed more than `stale_after` ago were left `syncing` by an
/// interrupted run and are recovered first. Younger claims may belong to a
/// daemon pass still in flight and are left alone. Rejected credentials stop
/// the drain and fail the command.
pub(crate) async fn drain_impl(
    queue: &Queue,
    sender: &dyn MutationSender,
    stale_after: Duration,
) -> Result<PassReport> {
    let recovered = queue.recover_stale(stale_after)?;
    if recovered > 0 {
        tracing::info!(recovered, "recovered interrupted items");
    }
    let report = queue.drain(sender).await?;
    if report.auth_failed {
        return Err(Error::AuthenticationFailed);
    }
    Ok(report)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
