// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP requests through the daemon's cache strategies.
//!
//! Without a daemon the request goes straight to the API; a mutation that
//! cannot reach the server is still deferred to the sync queue.

use bz_core::queue_item::PRIORITY_NORMAL;
use bz_core::{ApiError, HttpApi, HttpRequest};
use serde_json::Value;

use crate::config::Config;
use crate::daemon::{self, FetchOutcome};
use crate::error::{Error, Result};
use crate::sync::Queue;

use super::block_on;

pub fn run(config: &Config, url: &str, method: &str, data: Option<&str>) -> Result<()> {
    let request = build_request(method, url, data)?;
    let outcome = match daemon::connect_running(&config.state_dir)? {
        Some(mut client) => client.fetch(request)?,
        None => {
            let queue = config.open_queue()?;
            let api = config.api()?;
            block_on(fetch_direct(&api, &queue, request))??
        }
    };

    match outcome {
        FetchOutcome::Response(response) => {
            let text = response.text();
            print!("{}", text);
            if !text.is_empty() && !text.ends_with('\n') {
                println!();
            }
            if response.status >= 400 {
                return Err(Error::Request(format!("server returned {}", response.status)));
            }
            Ok(())
        }
        FetchOutcome::Queued { id } => {
            println!("Offline: queued as {}", id);
            println!("  hint: it will be sent when connectivity returns, or run 'bazaar sync'");
            Ok(())
        }
    }
}

/// Builds the request. A body must be valid JSON.
pub(crate) fn build_request(method: &str, url: &str, data: Option<&str>) -> Result<HttpRequest> {
    let request = HttpRequest::new(method, url);
    match data {
        Some(data) => {
            serde_json::from_str::<Value>(data).map_err(|e| Error::InvalidPayload {
                reason: e.to_string(),
            })?;
            Ok(request.with_json_body(data.as_bytes().to_vec()))
        }
        None => Ok(request),
    }
}

pub(crate) async fn fetch_direct(
    api: &HttpApi,
    queue: &Queue,
    request: HttpRequest,
) -> Result<FetchOutcome> {
    match api.fetch(&request).await {
        Ok(response) => Ok(FetchOutcome::Response(response)),
        Err(ApiError::Transport(reason)) if request.is_mutation() => {
            let item = queue.enqueue(
                &request.queue_kind(),
                request.queue_payload(),
                PRIORITY_NORMAL,
            )?;
            tracing::info!(id = %item.id, %reason, "request deferred to the sync queue");
            Ok(FetchOutcome::Queued { id: item.id })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
