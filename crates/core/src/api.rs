// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP collaborator for the marketplace API.
//!
//! [`HttpApi`] delivers queued mutations (`POST {api_url}/sync/{type}`) and
//! performs plain fetches on behalf of the background daemon. Request and
//! response values are serializable so they can cross the IPC boundary;
//! bodies travel base64-encoded.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue_item::QueueItem;
use crate::sync_queue::{MutationSender, SendError, SyncAck};

/// Longest error body kept in a [`SendError::Status`] message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Methods that change server state.
const MUTATING_METHODS: [&str; 4] = ["POST", "PUT", "PATCH", "DELETE"];

/// Error performing a fetch.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (DNS, connect, timeout, reset).
    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// An HTTP request routed through the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    /// Absolute URL, or a path relative to the API base URL.
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, with = "base64_body")]
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        HttpRequest {
            method: method.into().to_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Attaches a JSON body.
    pub fn with_json_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        self.body = body.into();
        self
    }

    /// True for POST, PUT, PATCH and DELETE.
    pub fn is_mutation(&self) -> bool {
        MUTATING_METHODS.contains(&self.method.to_uppercase().as_str())
    }

    /// Identity used to key cached responses.
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.url)
    }

    /// Queue kind for a deferred request: `http.post`, `http.delete`, ...
    pub fn queue_kind(&self) -> String {
        format!("http.{}", self.method.to_lowercase())
    }

    /// Queue payload for a deferred request. The body is kept as JSON when it
    /// parses, as text otherwise.
    pub fn queue_payload(&self) -> serde_json::Value {
        let body = if self.body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&self.body).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&self.body).into_owned())
            })
        };
        serde_json::json!({
            "method": self.method,
            "url": self.url,
            "body": body,
        })
    }

    /// The path component of the URL, without query string.
    pub fn path(&self) -> &str {
        let rest = match self.url.find("://") {
            Some(scheme_end) => {
                let after = &self.url[scheme_end + 3..];
                match after.find('/') {
                    Some(slash) => &after[slash..],
                    None => "/",
                }
            }
            None => self.url.as_str(),
        };
        match rest.find(|c: char| c == '?' || c == '#') {
            Some(end) => &rest[..end],
            None => rest,
        }
    }
}

/// A response returned to the foreground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, with = "base64_body")]
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        HttpResponse {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Marketplace API client.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpApi {
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Ok(HttpApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turns a relative path into an absolute URL.
    pub fn resolve(&self, url: &str) -> String {
        if url.contains("://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    /// Endpoint a queue item of the given type is delivered to.
    pub fn sync_url(&self, kind: &str) -> String {
        format!("{}/sync/{}", self.base_url, kind)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => builder.header(AUTHORIZATION, value),
                Err(_) => {
                    tracing::warn!("auth token is not a valid header value, sending without it");
                    builder
                }
            },
            None => builder,
        }
    }

    /// Performs a request. Any HTTP status is `Ok`; only a missing response is an error.
    pub async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| ApiError::InvalidRequest(format!("bad method '{}'", request.method)))?;

        let mut builder = self.client.request(method, self.resolve(&request.url));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        tracing::debug!(method = %request.method, url = %request.url, status, "fetched");
        Ok(HttpResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }

    async fn deliver(&self, item: &QueueItem) -> Result<SyncAck, SendError> {
        let response = self
            .authorize(self.client.post(self.sync_url(&item.kind)).json(&item.payload))
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        match status {
            200..=299 | 409 => Ok(parse_ack(&body)),
            401 | 403 => Err(SendError::Unauthorized(status)),
            _ => Err(SendError::Status {
                status,
                message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            }),
        }
    }
}

/// Reads `{ "entity": {...} }` from an acknowledgment body. Anything else is
/// an acknowledgment without a server version.
fn parse_ack(body: &str) -> SyncAck {
    if body.trim().is_empty() {
        return SyncAck::default();
    }
    serde_json::from_str(body).unwrap_or_default()
}

impl MutationSender for HttpApi {
    fn send<'a>(
        &'a self,
        item: &'a QueueItem,
    ) -> Pin<Box<dyn Future<Output = Result<SyncAck, SendError>> + Send + 'a>> {
        Box::pin(self.deliver(item))
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
