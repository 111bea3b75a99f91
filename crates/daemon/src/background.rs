// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background work: connectivity probing, sync queue replay and periodic
//! cache refresh.
//!
//! The worker sleeps until the next scheduled task or an explicit sync
//! request. An offline-to-online transition of the health probe drains the
//! sync queue without any foreground process running. While online, items
//! backing off after a failed delivery are retried as they come due.

use std::collections::HashMap;
use std::time::Duration;

use bz_core::{HttpRequest, PassReport};
use bz_ipc::Notice;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::state::DaemonState;

/// Shortest wait before a retry pass, so items a pass cannot settle do not
/// spin the worker.
const MIN_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Scheduled background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    HealthProbe,
    PeriodicRefresh,
    /// The earliest backed-off queue item is due.
    RetryDue,
}

/// One deadline per task. Scheduling a task again replaces its deadline.
#[derive(Debug, Default)]
pub struct Scheduler {
    deadlines: HashMap<Task, Instant>,
}

impl Scheduler {
    pub fn schedule(&mut self, task: Task, delay: Duration) {
        self.deadlines.insert(task, Instant::now() + delay);
    }

    pub fn cancel(&mut self, task: Task) {
        self.deadlines.remove(&task);
    }

    /// The task due soonest.
    pub fn next(&self) -> Option<(Task, Instant)> {
        self.deadlines
            .iter()
            .min_by_key(|(_, deadline)| **deadline)
            .map(|(task, deadline)| (*task, *deadline))
    }

    /// Waits for the soonest deadline and returns its task. Never completes
    /// when nothing is scheduled.
    pub async fn on_wake(&mut self) -> Task {
        let Some((task, deadline)) = self.next() else {
            return std::future::pending().await;
        };
        tokio::time::sleep_until(deadline).await;
        self.deadlines.remove(&task);
        task
    }
}

/// Runs the worker until the daemon shuts down.
pub async fn run(state: DaemonState) {
    let settings = state.cache_settings().clone();
    let health_interval = Duration::from_secs(settings.health_interval_secs);
    let refresh_interval = Duration::from_secs(settings.refresh_interval_secs);

    let mut scheduler = Scheduler::default();
    scheduler.schedule(Task::HealthProbe, Duration::ZERO);
    scheduler.schedule(Task::PeriodicRefresh, refresh_interval);

    loop {
        tokio::select! {
            _ = state.cancelled() => break,
            _ = state.sync_requested() => {
                state.notify(Notice::ProcessSyncQueue);
                sync_pass(&state).await;
            }
            task = scheduler.on_wake() => match task {
                Task::HealthProbe => {
                    probe(&state).await;
                    scheduler.schedule(Task::HealthProbe, health_interval);
                }
                Task::PeriodicRefresh => {
                    tokio::spawn(refresh(state.clone()));
                    scheduler.schedule(Task::PeriodicRefresh, refresh_interval);
                }
                Task::RetryDue => {
                    if state.is_online() {
                        debug!("queued retries due");
                        sync_pass(&state).await;
                    }
                }
            }
        }
        schedule_retry(&state, &mut scheduler);
    }
    debug!("background worker stopped");
}

/// Arms `RetryDue` for the earliest backed-off item. Offline, retries wait
/// for the probe to see the server again.
fn schedule_retry(state: &DaemonState, scheduler: &mut Scheduler) {
    if !state.is_online() {
        scheduler.cancel(Task::RetryDue);
        return;
    }
    match state.queue().next_retry_in() {
        Ok(Some(delay)) => scheduler.schedule(Task::RetryDue, delay.max(MIN_RETRY_WAIT)),
        Ok(None) => scheduler.cancel(Task::RetryDue),
        Err(e) => warn!(error = %e, "could not read retry schedule"),
    }
}

/// Probes the health endpoint. Returns whether the server answered.
///
/// Coming back online triggers a sync pass.
pub async fn probe(state: &DaemonState) -> bool {
    let request = HttpRequest::get(state.cache_settings().health_path.as_str());
    let online = match state.fetcher().fetch(&request).await {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "health probe failed");
            false
        }
    };

    let was_online = state.set_online(online);
    match (was_online, online) {
        (false, true) => {
            info!("server reachable, replaying sync queue");
            sync_pass(state).await;
        }
        (true, false) => warn!("server unreachable, working offline"),
        _ => {}
    }
    online
}

/// Drains the sync queue and reports the outcome to subscribers.
pub async fn sync_pass(state: &DaemonState) -> Option<PassReport> {
    let report = match state.queue().drain(state.sender()).await {
        Ok(report) => report,
        Err(e) => {
            error!("sync pass failed: {}", e);
            state.notify(Notice::SyncFailed {
                message: e.to_string(),
            });
            return None;
        }
    };

    for id in &report.synced_ids {
        state.notify(Notice::SyncSuccess { id: id.clone() });
    }
    if report.auth_failed {
        warn!("server rejected credentials, sync paused");
        state.notify(Notice::SyncFailed {
            message: "server rejected credentials".to_string(),
        });
    } else {
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "sync pass complete"
        );
        state.notify(Notice::SyncComplete {
            processed: report.processed,
            succeeded: report.succeeded,
            failed: report.failed,
        });
    }
    Some(report)
}

/// Pre-fetches the configured read endpoints into the API partition.
/// Failures are logged and counted.
pub async fn refresh(state: DaemonState) -> (usize, usize) {
    let mut refreshed = 0;
    let mut failed = 0;
    for endpoint in &state.cache_settings().refresh_endpoints {
        match state.router().prefetch(&HttpRequest::get(endpoint.as_str())).await {
            Ok(response) if response.is_success() => refreshed += 1,
            Ok(response) => {
                warn!(
                    endpoint = %endpoint,
                    status = response.status,
                    "refresh got an error status"
                );
                failed += 1;
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "refresh failed");
                failed += 1;
            }
        }
    }
    info!(refreshed, failed, "periodic refresh complete");
    state.notify(Notice::PeriodicRefreshComplete { refreshed, failed });
    (refreshed, failed)
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
