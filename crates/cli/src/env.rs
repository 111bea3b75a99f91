// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! All runtime environment variables used by the CLI are defined here
//! with typed accessor functions. The variable name constants are generated
//! by `build.rs` and live in the [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `BAZAAR_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(vars::BAZAAR_STATE_DIR).ok().map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(vars::XDG_STATE_HOME).ok().map(PathBuf::from)
}

/// Returns the value of `BAZAAR_DAEMON_BINARY` if set.
pub fn daemon_binary() -> Option<PathBuf> {
    std::env::var(vars::BAZAAR_DAEMON_BINARY)
        .ok()
        .map(PathBuf::from)
}

/// Returns `BAZAAR_AUTH_TOKEN` if set and non-empty. Overrides the config file.
pub fn auth_token() -> Option<String> {
    std::env::var(vars::BAZAAR_AUTH_TOKEN)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Returns `true` if `RUST_LOG` is set (any value).
pub fn log_requested() -> bool {
    std::env::var(vars::RUST_LOG).is_ok()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
