// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared configuration.
//!
//! Both the CLI and the daemon read `config.toml` from the state directory.
//! Every field has a default, so a missing file or a partial file is valid.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Config filename within the state directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub connection: ConnectionSettings,
    pub outbox: OutboxSettings,
    pub batching: BatchingSettings,
    pub sync: SyncSettings,
    pub cache: CacheSettings,
}

/// Marketplace endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Bearer token sent on HTTP requests and the channel handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Per-request HTTP timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Channel liveness and reconnection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Probe interval in milliseconds (default: 30000).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Max wait for a pong in milliseconds (default: 15000).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Reconnection attempts before giving up (default: 10).
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
    /// Max wait for the channel handshake in milliseconds (default: 10000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Outbound message buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxSettings {
    /// Messages held while disconnected (default: 500).
    #[serde(default = "default_outbox_capacity")]
    pub capacity: usize,
    /// Time allowed for a flush to be acknowledged (default: 30000).
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchingSettings {
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
    #[serde(default = "default_batch_window_ms")]
    pub window_ms: u64,
    /// Remembered tempIds for duplicate suppression (default: 1000).
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

/// Sync queue processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Items attempted concurrently per pass (default: 10).
    #[serde(default = "default_sync_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Daemon cache behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Partition version; bumping it drops older partitions on start.
    #[serde(default = "default_cache_version")]
    pub version: u32,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Read endpoints pre-fetched on each refresh.
    #[serde(default = "default_refresh_endpoints")]
    pub refresh_endpoints: Vec<String>,
    /// API path prefixes served stale-while-revalidate.
    #[serde(default = "default_swr_prefixes")]
    pub swr_prefixes: Vec<String>,
    /// Endpoint probed to detect connectivity.
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    15_000
}

fn default_reconnect_max_attempts() -> u32 {
    10
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_outbox_capacity() -> usize {
    500
}

fn default_flush_timeout_ms() -> u64 {
    30_000
}

fn default_batch_max_size() -> usize {
    10
}

fn default_batch_window_ms() -> u64 {
    50
}

fn default_dedup_capacity() -> usize {
    1000
}

fn default_sync_batch_size() -> usize {
    10
}

fn default_max_retries() -> u32 {
    crate::queue_item::DEFAULT_MAX_RETRIES
}

fn default_cache_version() -> u32 {
    1
}

fn default_refresh_interval_secs() -> u64 {
    86_400
}

fn default_refresh_endpoints() -> Vec<String> {
    vec!["/api/categories".to_string(), "/api/listings".to_string()]
}

fn default_swr_prefixes() -> Vec<String> {
    vec!["/api/listings".to_string(), "/api/categories".to_string()]
}

fn default_health_path() -> String {
    "/api/health".to_string()
}

fn default_health_interval_secs() -> u64 {
    15
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            auth_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for OutboxSettings {
    fn default() -> Self {
        OutboxSettings {
            capacity: default_outbox_capacity(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

impl Default for BatchingSettings {
    fn default() -> Self {
        BatchingSettings {
            max_size: default_batch_max_size(),
            window_ms: default_batch_window_ms(),
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            batch_size: default_sync_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            version: default_cache_version(),
            refresh_interval_secs: default_refresh_interval_secs(),
            refresh_endpoints: default_refresh_endpoints(),
            swr_prefixes: default_swr_prefixes(),
            health_path: default_health_path(),
            health_interval_secs: default_health_interval_secs(),
        }
    }
}

impl Settings {
    /// Loads `config.toml` from `state_dir`, or defaults if it does not exist.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes the settings to `config.toml` in `state_dir`.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(state_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.outbox.capacity == 0 {
            return Err(Error::Config("outbox.capacity must be at least 1".into()));
        }
        if self.batching.max_size == 0 {
            return Err(Error::Config("batching.max_size must be at least 1".into()));
        }
        if self.sync.batch_size == 0 {
            return Err(Error::Config("sync.batch_size must be at least 1".into()));
        }
        if !self.server.ws_url.starts_with("ws://") && !self.server.ws_url.starts_with("wss://") {
            return Err(Error::Config(format!(
                "invalid server.ws_url '{}': must be ws:// or wss://",
                self.server.ws_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
