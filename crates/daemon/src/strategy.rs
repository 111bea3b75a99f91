// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request interception.
//!
//! Every HTTP request a foreground process routes through the daemon is
//! classified into a caching strategy:
//!
//! - cache-first for static assets and media,
//! - stale-while-revalidate for the configured API read prefixes,
//! - network-first for everything else.
//!
//! Mutations that cannot reach the server are persisted to the sync queue
//! and answered with [`DaemonResponse::Queued`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bz_core::queue_item::PRIORITY_NORMAL;
use bz_core::{ApiError, HttpApi, HttpRequest, HttpResponse};
use bz_ipc::{DaemonResponse, Notice};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::cache::{CacheStore, Partition};
use crate::error::Result;
use crate::state::Queue;

const STATIC_PREFIXES: [&str; 2] = ["/static/", "/assets/"];
const STATIC_EXTENSIONS: [&str; 9] = [
    "css", "js", "mjs", "map", "woff", "woff2", "ttf", "otf", "eot",
];
const MEDIA_PREFIXES: [&str; 1] = ["/media/"];
const IMAGE_EXTENSIONS: [&str; 9] = [
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "bmp",
];

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200"><rect width="200" height="200" fill="#e5e7eb"/><text x="100" y="104" font-family="sans-serif" font-size="14" fill="#6b7280" text-anchor="middle">Image unavailable</text></svg>"##;

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from the partition, fetch and populate on a miss.
    CacheFirst(Partition),
    /// Serve cached data at once and refresh it in the background.
    StaleWhileRevalidate,
    /// Try the network, fall back to the API partition.
    NetworkFirst,
}

fn extension(path: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Picks the strategy for a read request.
pub fn classify(request: &HttpRequest, swr_prefixes: &[String]) -> Strategy {
    let path = request.path();
    let ext = extension(path);
    let has_ext = |list: &[&str]| ext.as_deref().is_some_and(|e| list.contains(&e));

    if MEDIA_PREFIXES.iter().any(|p| path.starts_with(p)) || has_ext(&IMAGE_EXTENSIONS) {
        return Strategy::CacheFirst(Partition::Media);
    }
    if STATIC_PREFIXES.iter().any(|p| path.starts_with(p)) || has_ext(&STATIC_EXTENSIONS) {
        return Strategy::CacheFirst(Partition::Static);
    }
    if swr_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
        return Strategy::StaleWhileRevalidate;
    }
    Strategy::NetworkFirst
}

/// Response served for an image that is neither reachable nor cached.
pub fn placeholder_image() -> HttpResponse {
    HttpResponse::new(200, Some("image/svg+xml"), PLACEHOLDER_SVG)
}

/// Performs network requests on the router's behalf.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<HttpResponse, ApiError>> + Send + 'a>>;
}

impl Fetcher for HttpApi {
    fn fetch<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<HttpResponse, ApiError>> + Send + 'a>> {
        Box::pin(HttpApi::fetch(self, request))
    }
}

/// Applies caching strategies and offline queueing to routed requests.
#[derive(Clone)]
pub struct Router {
    upstream: Arc<dyn Fetcher>,
    cache: Arc<Mutex<CacheStore>>,
    queue: Arc<Queue>,
    notices: broadcast::Sender<Notice>,
    swr_prefixes: Arc<Vec<String>>,
}

impl Router {
    pub fn new(
        upstream: Arc<dyn Fetcher>,
        cache: Arc<Mutex<CacheStore>>,
        queue: Arc<Queue>,
        notices: broadcast::Sender<Notice>,
        swr_prefixes: Vec<String>,
    ) -> Self {
        Router {
            upstream,
            cache,
            queue,
            notices,
            swr_prefixes: Arc::new(swr_prefixes),
        }
    }

    /// Serves one request. Returns `Fetched` or `Queued`.
    pub async fn handle(&self, request: HttpRequest) -> Result<DaemonResponse> {
        if request.is_mutation() {
            return self.mutate(request).await;
        }
        let response = match classify(&request, &self.swr_prefixes) {
            Strategy::CacheFirst(partition) => self.cache_first(partition, &request).await?,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await?,
            Strategy::NetworkFirst => self.network_first(&request).await?,
        };
        Ok(DaemonResponse::Fetched { response })
    }

    /// Fetches `request` into the API partition. Used by periodic refresh.
    pub async fn prefetch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self.upstream.fetch(request).await?;
        if response.is_success() {
            self.store(Partition::Api, &request.cache_key(), &response)
                .await?;
        }
        Ok(response)
    }

    async fn mutate(&self, request: HttpRequest) -> Result<DaemonResponse> {
        match self.upstream.fetch(&request).await {
            Ok(response) => Ok(DaemonResponse::Fetched { response }),
            Err(ApiError::Transport(reason)) => {
                let item =
                    self.queue
                        .enqueue(&request.queue_kind(), request.queue_payload(), PRIORITY_NORMAL)?;
                warn!(
                    id = %item.id,
                    url = %request.url,
                    %reason,
                    "server unreachable, mutation queued"
                );
                let _ = self.notices.send(Notice::SyncQueued {
                    id: item.id.clone(),
                });
                Ok(DaemonResponse::Queued { id: item.id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn cache_first(
        &self,
        partition: Partition,
        request: &HttpRequest,
    ) -> Result<HttpResponse> {
        let key = request.cache_key();
        if let Some(response) = self.lookup(partition, &key).await? {
            return Ok(response);
        }
        match self.upstream.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store(partition, &key, &response).await?;
                }
                Ok(response)
            }
            Err(e) if partition == Partition::Media => {
                debug!(url = %request.url, error = %e, "serving image placeholder");
                Ok(placeholder_image())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stale_while_revalidate(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = request.cache_key();
        if let Some(response) = self.lookup(Partition::Api, &key).await? {
            self.revalidate(request);
            return Ok(response);
        }
        self.prefetch(&request).await
    }

    async fn network_first(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let key = request.cache_key();
        match self.upstream.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store(Partition::Api, &key, &response).await?;
                }
                Ok(response)
            }
            Err(e) => {
                let cached = self.cache.lock().await.get(Partition::Api, &key)?;
                match cached {
                    Some(cached) => {
                        debug!(
                            url = %request.url,
                            error = %e,
                            stored_at = cached.stored_at,
                            "network failed, serving cached copy"
                        );
                        Ok(cached.response)
                    }
                    None => Err(e.into()),
                }
            }
        }
    }

    fn revalidate(&self, request: HttpRequest) {
        let router = self.clone();
        tokio::spawn(async move {
            if let Err(e) = router.prefetch(&request).await {
                debug!(url = %request.url, error = %e, "background revalidation failed");
            }
        });
    }

    async fn lookup(&self, partition: Partition, key: &str) -> Result<Option<HttpResponse>> {
        let cache = self.cache.lock().await;
        Ok(cache.get(partition, key)?.map(|cached| cached.response))
    }

    async fn store(&self, partition: Partition, key: &str, response: &HttpResponse) -> Result<()> {
        let cache = self.cache.lock().await;
        cache.put(partition, key, response)
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
