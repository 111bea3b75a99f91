// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! State directory and settings resolution.
//!
//! Everything the CLI and daemon persist lives in one state directory:
//! - `config.toml`: [`Settings`]
//! - `bazaar.db`: durable queue store
//! - `conflicts.jsonl`: conflict resolution audit log
//! - `daemon.sock`, `daemon.pid`, `daemon.lock`, `daemon.log`: daemon files

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bz_core::{HttpApi, Settings, SqliteStore, SyncOptions, SyncQueue, SystemClock};

use crate::env;
use crate::error::{Error, Result};
use crate::sync::{ConnectionConfig, Queue};

const APP_DIR_NAME: &str = "bazaar";
const DB_FILE_NAME: &str = "bazaar.db";
const HISTORY_FILE_NAME: &str = "conflicts.jsonl";

/// Resolved configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub settings: Settings,
}

/// Picks the state directory.
///
/// Order: explicit flag, `BAZAAR_STATE_DIR`, `$XDG_STATE_HOME/bazaar`,
/// `~/.local/state/bazaar`.
pub fn resolve_state_dir(
    flag: Option<&Path>,
    env_dir: Option<PathBuf>,
    xdg_state_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env_dir {
        return Ok(dir);
    }
    if let Some(xdg) = xdg_state_home {
        return Ok(xdg.join(APP_DIR_NAME));
    }
    home.map(|h| h.join(".local").join("state").join(APP_DIR_NAME))
        .ok_or_else(|| Error::Config("cannot determine a state directory: HOME is not set".into()))
}

/// The state directory for this process, ignoring any flag.
pub fn default_state_dir() -> Result<PathBuf> {
    resolve_state_dir(None, env::state_dir(), env::xdg_state_home(), dirs::home_dir())
}

impl Config {
    /// Loads settings from the resolved state directory.
    ///
    /// `BAZAAR_AUTH_TOKEN` takes precedence over `server.auth_token`.
    pub fn load(state_dir_flag: Option<&Path>) -> Result<Self> {
        let state_dir = resolve_state_dir(
            state_dir_flag,
            env::state_dir(),
            env::xdg_state_home(),
            dirs::home_dir(),
        )?;
        Self::load_from(state_dir, env::auth_token())
    }

    pub fn load_from(state_dir: PathBuf, auth_token: Option<String>) -> Result<Self> {
        let mut settings = Settings::load(&state_dir)?;
        if auth_token.is_some() {
            settings.server.auth_token = auth_token;
        }
        Ok(Config {
            state_dir,
            settings,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join(DB_FILE_NAME)
    }

    pub fn history_path(&self) -> PathBuf {
        self.state_dir.join(HISTORY_FILE_NAME)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::from_settings(&self.settings)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.settings.sync.batch_size,
            max_retries: self.settings.sync.max_retries,
        }
    }

    /// Opens the durable queue, creating the state directory if needed.
    pub fn open_queue(&self) -> Result<Queue> {
        let store = SqliteStore::open(&self.db_path())?;
        Ok(SyncQueue::new(
            Arc::new(store),
            SystemClock,
            self.sync_options(),
            self.history_path(),
        ))
    }

    /// HTTP collaborator for direct (daemon-less) requests.
    pub fn api(&self) -> Result<HttpApi> {
        let server = &self.settings.server;
        Ok(HttpApi::new(
            &server.api_url,
            server.auth_token.clone(),
            server.request_timeout(),
        )?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
