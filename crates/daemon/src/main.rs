// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bazaard - The bazaar background daemon.
//!
//! Serves HTTP requests routed by `bazaar` CLI processes through its cache
//! strategies, replays the offline sync queue when the server becomes
//! reachable, and pushes notices to subscribed foreground processes.
//! Listens on a Unix socket in the state directory.
//!
//! Usage:
//!   bazaard --state-dir <path>

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bz_core::{HttpApi, Settings, SqliteStore, SyncOptions, SyncQueue, SystemClock};
use tokio::net::UnixListener;

mod background;
mod cache;
mod env;
mod error;
mod server;
mod state;
mod strategy;

#[cfg(test)]
mod test_support;

use cache::CacheStore;
use error::Result;
use state::DaemonState;

/// Socket filename within daemon directory.
const SOCKET_NAME: &str = "daemon.sock";
/// PID filename within daemon directory.
const PID_NAME: &str = "daemon.pid";
/// Lock filename for single instance guarantee.
const LOCK_NAME: &str = "daemon.lock";
/// Durable queue shared with the CLI.
const DB_NAME: &str = "bazaar.db";
/// Conflict resolution audit log shared with the CLI.
const HISTORY_NAME: &str = "conflicts.jsonl";
/// Response cache, owned by the daemon.
const CACHE_NAME: &str = "cache.db";

fn main() {
    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let state_dir = parse_state_dir(&args);
    if let Err(e) = fs::create_dir_all(&state_dir) {
        eprintln!("error: cannot create {}: {}", state_dir.display(), e);
        std::process::exit(1);
    }

    // Set up logging
    let log_path = state_dir.join("daemon.log");
    setup_logging(&log_path);

    tracing::info!("bazaard starting, state_dir={}", state_dir.display());

    // Acquire file lock for single instance
    let lock_path = state_dir.join(LOCK_NAME);
    let lock_file = match acquire_lock(&lock_path) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("failed to acquire lock: {}", e);
            std::process::exit(1);
        }
    };

    // Write PID file
    let pid_path = state_dir.join(PID_NAME);
    if let Err(e) = write_pid_file(&pid_path) {
        tracing::error!("failed to write PID file: {}", e);
        std::process::exit(1);
    }

    let socket_path = state_dir.join(SOCKET_NAME);
    let state = match open_state(&state_dir) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("failed to open state: {}", e);
            cleanup(&pid_path, &socket_path);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("failed to start runtime: {}", e);
            cleanup(&pid_path, &socket_path);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(serve(&socket_path, state));

    // Cleanup
    cleanup(&pid_path, &socket_path);
    drop(lock_file);
    match result {
        Ok(()) => tracing::info!("bazaard stopped"),
        Err(e) => {
            tracing::error!("bazaard failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Loads settings and opens the queue and cache.
fn open_state(state_dir: &Path) -> Result<DaemonState> {
    let mut settings = Settings::load(state_dir)?;
    if let Some(token) = env::auth_token() {
        settings.server.auth_token = Some(token);
    }

    let store = SqliteStore::open(&state_dir.join(DB_NAME))?;
    let queue = SyncQueue::new(
        Arc::new(store),
        SystemClock,
        SyncOptions {
            batch_size: settings.sync.batch_size,
            max_retries: settings.sync.max_retries,
        },
        state_dir.join(HISTORY_NAME),
    );
    // Items left mid-delivery by a crash go back to pending.
    queue.recover_interrupted()?;

    let cache = CacheStore::open(&state_dir.join(CACHE_NAME), settings.cache.version)?;
    let dropped = cache.activate()?;
    if dropped > 0 {
        tracing::info!(dropped, version = cache.version(), "activated cache version");
    }

    let api = HttpApi::new(
        &settings.server.api_url,
        settings.server.auth_token.clone(),
        settings.server.request_timeout(),
    )?;
    Ok(DaemonState::new(Arc::new(api), Arc::new(queue), cache, settings.cache))
}

/// Binds the socket, signals readiness, and runs until shutdown.
async fn serve(socket_path: &Path, state: DaemonState) -> std::io::Result<()> {
    // Remove stale socket if it exists
    let _ = fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    tracing::info!("listening on {}", socket_path.display());

    // Signal readiness to parent process
    println!("READY");
    // Flush stdout so parent sees READY immediately
    let _ = std::io::stdout().flush();

    tokio::spawn(stop_on_terminate(state.clone()));
    let worker = tokio::spawn(background::run(state.clone()));
    server::run(listener, state.clone()).await;

    state.shutdown();
    if let Err(e) = worker.await {
        tracing::warn!("background worker ended abnormally: {}", e);
    }
    Ok(())
}

async fn stop_on_terminate(state: DaemonState) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {}", e);
            return;
        }
    };
    tokio::select! {
        _ = terminate.recv() => {
            tracing::info!("received SIGTERM");
            state.shutdown();
        }
        _ = state.cancelled() => {}
    }
}

fn parse_state_dir(args: &[String]) -> PathBuf {
    for i in 0..args.len() {
        if args[i] == "--state-dir" {
            if let Some(dir) = args.get(i + 1) {
                return PathBuf::from(dir);
            }
        }
    }
    // Default to XDG state directory
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(dir) = env::xdg_state_home() {
        return dir.join("bazaar");
    }
    dirs::home_dir()
        .map(|h| h.join(".local/state/bazaar"))
        .unwrap_or_else(|| PathBuf::from(".local/state/bazaar"))
}

fn setup_logging(log_path: &Path) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Try to open log file, fall back to stderr
    if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn acquire_lock(lock_path: &Path) -> std::io::Result<fs::File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| std::io::Error::other("another daemon instance is already running"))?;
    Ok(file)
}

fn write_pid_file(pid_path: &Path) -> std::io::Result<()> {
    fs::write(pid_path, format!("{}", std::process::id()))
}

fn cleanup(pid_path: &Path, socket_path: &Path) {
    let _ = fs::remove_file(pid_path);
    let _ = fs::remove_file(socket_path);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
