// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon state shared by connection tasks and the background worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bz_core::config::CacheSettings;
use bz_core::{MutationSender, SqliteStore, SyncQueue, SystemClock};
use bz_ipc::{DaemonStatus, Notice};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::error::Result;
use crate::strategy::{Fetcher, Router};

/// The durable sync queue as the daemon uses it.
pub type Queue = SyncQueue<SqliteStore, SystemClock>;

/// Buffered notices per subscriber before it starts lagging.
const NOTICE_BUFFER: usize = 256;

/// Cheaply cloneable handle to the daemon's state.
#[derive(Clone)]
pub struct DaemonState {
    inner: Arc<DaemonStateInner>,
}

struct DaemonStateInner {
    started: Instant,
    queue: Arc<Queue>,
    router: Router,
    fetcher: Arc<dyn Fetcher>,
    sender: Arc<dyn MutationSender>,
    cache: CacheSettings,
    /// Result of the last health probe.
    online: AtomicBool,
    notices: broadcast::Sender<Notice>,
    sync_requested: Notify,
    shutdown: CancellationToken,
}

impl DaemonState {
    /// Builds the state around one upstream that both serves fetches and
    /// delivers queued mutations.
    pub fn new<U>(
        upstream: Arc<U>,
        queue: Arc<Queue>,
        cache: CacheStore,
        settings: CacheSettings,
    ) -> Self
    where
        U: Fetcher + MutationSender + 'static,
    {
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);
        let fetcher: Arc<dyn Fetcher> = upstream.clone();
        let sender: Arc<dyn MutationSender> = upstream;
        let router = Router::new(
            Arc::clone(&fetcher),
            Arc::new(Mutex::new(cache)),
            Arc::clone(&queue),
            notices.clone(),
            settings.swr_prefixes.clone(),
        );
        DaemonState {
            inner: Arc::new(DaemonStateInner {
                started: Instant::now(),
                queue,
                router,
                fetcher,
                sender,
                cache: settings,
                online: AtomicBool::new(false),
                notices,
                sync_requested: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.inner.fetcher.as_ref()
    }

    pub fn sender(&self) -> &dyn MutationSender {
        self.inner.sender.as_ref()
    }

    pub fn cache_settings(&self) -> &CacheSettings {
        &self.inner.cache
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Records a probe result and returns the previous one.
    pub fn set_online(&self, online: bool) -> bool {
        self.inner.online.swap(online, Ordering::SeqCst)
    }

    /// Sends a notice to every subscribed foreground process.
    pub fn notify(&self, notice: Notice) {
        tracing::debug!(?notice, "notice");
        let _ = self.inner.notices.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    pub fn subscribers(&self) -> usize {
        self.inner.notices.receiver_count()
    }

    /// Asks the background worker for a sync pass. Requests made while a
    /// pass is running collapse into one follow-up pass.
    pub fn request_sync(&self) {
        self.inner.sync_requested.notify_one();
    }

    pub async fn sync_requested(&self) {
        self.inner.sync_requested.notified().await;
    }

    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub async fn cancelled(&self) {
        self.inner.shutdown.cancelled().await;
    }

    pub fn status(&self) -> Result<DaemonStatus> {
        let uptime = self.inner.started.elapsed().as_secs();
        let mut status = DaemonStatus::new(std::process::id(), uptime);
        status.online = self.is_online();
        status.queue = self.inner.queue.stats()?;
        status.pending_conflicts = self.inner.queue.pending_conflicts()?.len();
        status.cache_version = self.inner.cache.version;
        status.subscribers = self.subscribers();
        Ok(status)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
