// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::path::PathBuf;

#[test]
fn test_vars_constants() {
    assert_eq!(vars::BAZAAR_STATE_DIR, "BAZAAR_STATE_DIR");
    assert_eq!(vars::XDG_STATE_HOME, "XDG_STATE_HOME");
    assert_eq!(vars::BAZAAR_DAEMON_BINARY, "BAZAAR_DAEMON_BINARY");
    assert_eq!(vars::BAZAAR_AUTH_TOKEN, "BAZAAR_AUTH_TOKEN");
    assert_eq!(vars::RUST_LOG, "RUST_LOG");
}

#[test]
fn test_state_dir_set() {
    std::env::set_var("BAZAAR_STATE_DIR", "/tmp/bazaar-state");
    assert_eq!(state_dir(), Some(PathBuf::from("/tmp/bazaar-state")));
    std::env::remove_var("BAZAAR_STATE_DIR");
    assert_eq!(state_dir(), None);
}

#[test]
fn test_daemon_binary_set() {
    std::env::set_var("BAZAAR_DAEMON_BINARY", "/usr/local/bin/bazaard");
    assert_eq!(
        daemon_binary(),
        Some(PathBuf::from("/usr/local/bin/bazaard"))
    );
    std::env::remove_var("BAZAAR_DAEMON_BINARY");
}

#[test]
fn test_auth_token_ignores_blank() {
    std::env::set_var("BAZAAR_AUTH_TOKEN", "  ");
    assert_eq!(auth_token(), None);
    std::env::set_var("BAZAAR_AUTH_TOKEN", "tok-1");
    assert_eq!(auth_token().as_deref(), Some("tok-1"));
    std::env::remove_var("BAZAAR_AUTH_TOKEN");
}
