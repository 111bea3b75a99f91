// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted upstream and state fixtures for daemon tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bz_core::config::CacheSettings;
use bz_core::{
    ApiError, HttpRequest, HttpResponse, MutationSender, QueueItem, SendError, SqliteStore, SyncAck,
    SyncOptions, SyncQueue, SystemClock,
};
use bz_ipc::Notice;
use tempfile::TempDir;
use tokio::sync::broadcast;

use crate::cache::CacheStore;
use crate::state::DaemonState;
use crate::strategy::Fetcher;

/// An API server whose reachability and responses are set by the test.
#[derive(Default)]
pub struct FakeUpstream {
    online: AtomicBool,
    reject_credentials: AtomicBool,
    responses: Mutex<HashMap<String, HttpResponse>>,
    fetched: Mutex<Vec<String>>,
    delivered: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn online() -> Arc<Self> {
        let upstream = FakeUpstream::default();
        upstream.online.store(true, Ordering::SeqCst);
        Arc::new(upstream)
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(FakeUpstream::default())
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn reject_credentials(&self) {
        self.reject_credentials.store(true, Ordering::SeqCst);
    }

    /// Answers GETs for `path` with a 200 JSON body.
    pub fn respond_json(&self, path: &str, body: &str) {
        self.respond(path, HttpResponse::new(200, Some("application/json"), body));
    }

    pub fn respond(&self, path: &str, response: HttpResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    /// How many fetches reached the network for `path`.
    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    fn answer(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.fetched
            .lock()
            .unwrap()
            .push(request.path().to_string());
        if !self.online.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        if request.is_mutation() {
            return Ok(HttpResponse::new(201, Some("application/json"), "{}"));
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .get(request.path())
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404, None, "")))
    }

    fn deliver(&self, item: &QueueItem) -> Result<SyncAck, SendError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(SendError::Transport("connection refused".to_string()));
        }
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(SendError::Unauthorized(401));
        }
        self.delivered.lock().unwrap().push(item.id.clone());
        Ok(SyncAck::default())
    }
}

impl Fetcher for FakeUpstream {
    fn fetch<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, ApiError>> + Send + 'a>> {
        let result = self.answer(request);
        Box::pin(async move { result })
    }
}

impl MutationSender for FakeUpstream {
    fn send<'a>(
        &'a self,
        item: &'a QueueItem,
    ) -> Pin<Box<dyn Future<Output = Result<SyncAck, SendError>> + Send + 'a>> {
        let result = self.deliver(item);
        Box::pin(async move { result })
    }
}

/// Daemon state over an in-memory queue and cache.
pub struct TestDaemon {
    pub state: DaemonState,
    pub upstream: Arc<FakeUpstream>,
    _dir: TempDir,
}

impl TestDaemon {
    pub fn new(upstream: Arc<FakeUpstream>) -> Self {
        Self::with_settings(upstream, CacheSettings::default())
    }

    pub fn with_settings(upstream: Arc<FakeUpstream>, settings: CacheSettings) -> Self {
        let dir = TempDir::new().unwrap();
        let queue = SyncQueue::new(
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            SystemClock,
            SyncOptions::default(),
            dir.path().join("conflicts.jsonl"),
        );
        let cache = CacheStore::open_in_memory(settings.version).unwrap();
        let state = DaemonState::new(Arc::clone(&upstream), Arc::new(queue), cache, settings);
        TestDaemon {
            state,
            upstream,
            _dir: dir,
        }
    }

    /// Queues a mutation at normal priority and returns its id.
    pub fn enqueue(&self, kind: &str) -> String {
        self.state
            .queue()
            .enqueue(kind, serde_json::json!({"amount": 40}), 5)
            .unwrap()
            .id
    }
}

/// Notices received so far, without waiting.
pub fn drain_notices(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}

/// Waits for a notice matching `pred`, skipping others.
pub async fn wait_for_notice(
    rx: &mut broadcast::Receiver<Notice>,
    pred: impl Fn(&Notice) -> bool,
) -> Notice {
    let wait = async {
        loop {
            let notice = rx.recv().await.unwrap();
            if pred(&notice) {
                return notice;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait).await.unwrap()
}
