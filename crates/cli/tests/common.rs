// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// The CLI, isolated in `state`: no daemon binary, no ambient token.
pub fn bazaar(state: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("bazaar");
    cmd.env("BAZAAR_STATE_DIR", state.path())
        .env("BAZAAR_DAEMON_BINARY", state.path().join("no-such-bazaard"))
        .env_remove("BAZAAR_AUTH_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

/// Queue an item and return its id.
pub fn add_item(state: &TempDir, kind: &str, payload: &str, priority: u8) -> String {
    let output = bazaar(state)
        .args(["queue", "add", kind, payload, "-p"])
        .arg(priority.to_string())
        .output()
        .unwrap();
    assert!(output.status.success(), "queue add failed: {:?}", output);

    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .find(|s| s.starts_with("q-"))
        .unwrap()
        .to_string()
}

/// Points the API at a port nothing listens on.
pub fn write_offline_config(state: &TempDir) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    std::fs::write(
        state.path().join("config.toml"),
        format!(
            "[server]\napi_url = \"http://127.0.0.1:{port}\"\nws_url = \"ws://127.0.0.1:{port}/ws\"\nrequest_timeout_secs = 2\n"
        ),
    )
    .unwrap();
}
