// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variables read by the daemon.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod names {
    include!(concat!(env!("OUT_DIR"), "/env_names.rs"));
}

/// Returns the value of `BAZAAR_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(names::BAZAAR_STATE_DIR).ok().map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(names::XDG_STATE_HOME).ok().map(PathBuf::from)
}

/// Returns `BAZAAR_AUTH_TOKEN` if set and non-empty.
pub fn auth_token() -> Option<String> {
    std::env::var(names::BAZAAR_AUTH_TOKEN)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
