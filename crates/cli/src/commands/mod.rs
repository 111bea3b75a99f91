// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod chat;
pub mod conflicts;
pub mod daemon;
pub mod fetch;
pub mod queue;
pub mod status;
pub mod sync;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::future::Future;

use serde::Serialize;

use crate::error::Result;

/// Runs an async command body to completion on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
