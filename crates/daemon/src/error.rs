// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors raised inside the daemon.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] bz_core::Error),

    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("{0}")]
    Api(#[from] bz_core::ApiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
