// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection manager for the real-time channel.
//!
//! A single actor task owns the transport and multiplexes three inputs with
//! `tokio::select!`: commands from [`ConnectionManager`] handles, inbound
//! frames, and timer deadlines. Every timer is an explicit deadline in the
//! actor state, so at most one heartbeat deadline and one reconnect deadline
//! exist at a time.
//!
//! ```text
//!             connect()                open ok
//! Disconnected ────────► Connecting ──────────► Connected
//!      ▲                     │                      │
//!      │   open failed       │   close / error /    │
//!      └─────────────────────┴──── heartbeat miss ──┘
//! ```
//!
//! Transport errors never escape as `Err`. They are logged, published through
//! [`ConnectionManager::last_error`] and answered with a scheduled reconnect.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bz_core::config::Settings;
use bz_core::protocol::{close_code, new_temp_id};
use bz_core::{
    Advisory, ChannelMessage, ClockSource, CloseKind, ErrorClass, MessageBody, SystemClock,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::backoff;
use super::batch::{self, Batcher};
use super::dedup::SeenSet;
use super::outbox::{Outbox, Pressure};
use super::transport::{Inbound, Transport, TransportError};

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Observable state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        write!(f, "{s}")
    }
}

/// Everything subscribers can observe.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    /// The channel went down. `reconnect` tells whether a retry follows.
    Disconnected { code: Option<u16>, reconnect: bool },
    /// A deduplicated domain message from the server.
    Message(ChannelMessage),
    /// Advisory error. Also available through `last_error`.
    Error(Advisory),
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Terminal: no more automatic attempts.
    ReconnectExhausted { attempts: u32 },
    /// Terminal: credentials must be refreshed before connecting again.
    AuthenticationFailed,
    /// A flush was not acknowledged in time. Messages are retained.
    FlushStalled { unacked: usize },
}

/// Tunables for one managed connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub connect_timeout: Duration,
    pub outbox_capacity: usize,
    pub flush_timeout: Duration,
    pub batch_max_size: usize,
    pub batch_window: Duration,
    pub dedup_capacity: usize,
}

impl ConnectionConfig {
    /// Defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        let mut config = Self::from_settings(&Settings::default());
        config.url = url.into();
        config
    }

    pub fn from_settings(settings: &Settings) -> Self {
        ConnectionConfig {
            url: settings.server.ws_url.clone(),
            heartbeat_interval: Duration::from_millis(settings.connection.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(settings.connection.heartbeat_timeout_ms),
            max_reconnect_attempts: settings.connection.reconnect_max_attempts,
            connect_timeout: Duration::from_millis(settings.connection.connect_timeout_ms),
            outbox_capacity: settings.outbox.capacity,
            flush_timeout: Duration::from_millis(settings.outbox.flush_timeout_ms),
            batch_max_size: settings.batching.max_size,
            batch_window: Duration::from_millis(settings.batching.window_ms),
            dedup_capacity: settings.batching.dedup_capacity,
        }
    }
}

enum Command {
    Connect,
    Close,
    Send { message: ChannelMessage, batched: bool },
    SetVisible(bool),
}

/// Heartbeat phase. Exactly one deadline is armed while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heartbeat {
    Off,
    Idle { next_probe: Instant },
    AwaitingPong { deadline: Instant },
}

impl Heartbeat {
    fn deadline(&self) -> Option<Instant> {
        match self {
            Heartbeat::Off => None,
            Heartbeat::Idle { next_probe } => Some(*next_probe),
            Heartbeat::AwaitingPong { deadline } => Some(*deadline),
        }
    }
}

/// Handle to a running connection actor.
///
/// Dropping the handle stops the actor. Use [`close`](Self::close) for an
/// orderly shutdown.
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    last_error: watch::Receiver<Option<Advisory>>,
    events: broadcast::Sender<ConnectionEvent>,
    outbox_len: Arc<AtomicUsize>,
    cancel_token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Starts the actor. Must be called from within a tokio runtime.
    ///
    /// The channel stays down until [`connect`](Self::connect).
    pub fn spawn<T: Transport + 'static>(config: ConnectionConfig, transport: T) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (error_tx, last_error) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let outbox_len = Arc::new(AtomicUsize::new(0));
        let cancel_token = CancellationToken::new();

        let actor = Actor {
            outbox: Outbox::new(config.outbox_capacity),
            batcher: Batcher::new(config.batch_max_size, config.batch_window),
            seen: SeenSet::new(config.dedup_capacity),
            config,
            transport,
            state: ConnectionState::Disconnected,
            visible: true,
            closed_by_user: false,
            attempt: 0,
            reconnect_at: None,
            heartbeat: Heartbeat::Off,
            in_flight: Vec::new(),
            flush_deadline: None,
            state_tx,
            error_tx,
            events: events.clone(),
            outbox_len: Arc::clone(&outbox_len),
            cancel_token: cancel_token.clone(),
        };
        let task = tokio::spawn(actor.run(command_rx));

        ConnectionManager {
            commands,
            state,
            last_error,
            events,
            outbox_len,
            cancel_token,
            task: Mutex::new(Some(task)),
        }
    }

    /// Opens the channel. No-op while connecting or connected.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Closes the channel without reconnecting and stops the actor.
    pub async fn close(&self) {
        self.command(Command::Close);
        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "connection task ended abnormally");
            }
        }
    }

    /// Sends a message now, or buffers it until the channel opens.
    ///
    /// Returns the generated tempId. Probes carry none.
    pub fn send(&self, body: MessageBody) -> Option<String> {
        self.submit(body, false)
    }

    /// Like [`send`](Self::send), but allows grouping with other messages.
    pub fn send_batched(&self, body: MessageBody) -> Option<String> {
        self.submit(body, true)
    }

    /// Reconnection pauses while the host is hidden and resumes when visible.
    pub fn set_visible(&self, visible: bool) {
        self.command(Command::SetVisible(visible));
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// The most recent advisory error, cleared by a successful handshake.
    pub fn last_error(&self) -> Option<Advisory> {
        self.last_error.borrow().clone()
    }

    pub fn watch_errors(&self) -> watch::Receiver<Option<Advisory>> {
        self.last_error.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Messages waiting for the channel.
    pub fn outbox_len(&self) -> usize {
        self.outbox_len.load(Ordering::Relaxed)
    }

    fn submit(&self, body: MessageBody, batched: bool) -> Option<String> {
        let mut message = ChannelMessage::new(body, SystemClock.now_ms());
        let temp_id = if message.body.is_probe() {
            None
        } else {
            let id = new_temp_id();
            message.temp_id = Some(id.clone());
            Some(id)
        };
        self.command(Command::Send { message, batched });
        temp_id
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("connection actor has stopped");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct Actor<T> {
    config: ConnectionConfig,
    transport: T,
    state: ConnectionState,
    visible: bool,
    closed_by_user: bool,
    /// Reconnects scheduled since the last successful handshake.
    attempt: u32,
    reconnect_at: Option<Instant>,
    heartbeat: Heartbeat,
    outbox: Outbox,
    batcher: Batcher,
    seen: SeenSet,
    /// Flushed frames awaiting acknowledgment, in send order.
    in_flight: Vec<ChannelMessage>,
    flush_deadline: Option<Instant>,
    state_tx: watch::Sender<ConnectionState>,
    error_tx: watch::Sender<Option<Advisory>>,
    events: broadcast::Sender<ConnectionEvent>,
    outbox_len: Arc<AtomicUsize>,
    cancel_token: CancellationToken,
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl<T: Transport> Actor<T> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let cancel_token = self.cancel_token.clone();
        loop {
            let heartbeat_at = self.heartbeat.deadline();
            let reconnect_at = if self.visible { self.reconnect_at } else { None };
            let batch_at = self.batcher.deadline();
            let flush_at = self.flush_deadline;
            let receiving = self.state == ConnectionState::Connected;

            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                command = commands.recv() => match command {
                    Some(Command::Close) | None => {
                        self.close_by_user().await;
                        break;
                    }
                    Some(command) => self.handle_command(command, &mut commands).await,
                },
                inbound = self.transport.recv(), if receiving => match inbound {
                    Ok(Inbound::Text(text)) => self.on_frame(&text).await,
                    Ok(Inbound::Closed(code)) => {
                        tracing::info!(?code, "channel closed by server");
                        self.connection_lost(code, "closed by server").await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "channel receive failed");
                        self.connection_lost(None, &e.to_string()).await;
                    }
                },
                _ = sleep_until_some(heartbeat_at) => self.on_heartbeat_deadline().await,
                _ = sleep_until_some(reconnect_at) => {
                    self.reconnect_at = None;
                    self.open(&mut commands).await;
                }
                _ = sleep_until_some(batch_at) => self.flush_batch().await,
                _ = sleep_until_some(flush_at) => self.on_flush_stalled(),
            }
        }

        if self.transport.is_connected() {
            let _ = self.transport.disconnect().await;
        }
        tracing::debug!("connection actor stopped");
    }

    async fn handle_command(
        &mut self,
        command: Command,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) {
        match command {
            Command::Connect => {
                self.closed_by_user = false;
                if self.state != ConnectionState::Disconnected {
                    tracing::debug!(state = %self.state, "connect ignored");
                    return;
                }
                if self.attempt >= self.config.max_reconnect_attempts {
                    self.attempt = 0;
                }
                self.reconnect_at = None;
                self.open(commands).await;
            }
            Command::Send { message, batched } => self.submit(message, batched).await,
            Command::SetVisible(visible) => self.set_visible(visible),
            Command::Close => {}
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        tracing::debug!(visible, "visibility changed");
        // A reconnect that came due while hidden runs right away
        if visible {
            if let Some(at) = self.reconnect_at {
                self.reconnect_at = Some(at.min(Instant::now()));
            }
        }
    }

    /// Runs the handshake, bounded by `connect_timeout`.
    ///
    /// Commands keep being read meanwhile. A close aborts the handshake and
    /// stops the actor; anything else is applied once the handshake settles.
    async fn open(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) {
        self.set_state(ConnectionState::Connecting);
        let url = self.config.url.clone();
        let timeout = self.config.connect_timeout;
        tracing::debug!(%url, attempt = self.attempt, "opening channel");

        let mut deferred = Vec::new();
        let result = {
            let handshake = tokio::time::timeout(timeout, self.transport.connect(&url));
            tokio::pin!(handshake);
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel_token.cancelled() => return,
                    command = commands.recv() => match command {
                        Some(Command::Close) | None => break None,
                        Some(command) => deferred.push(command),
                    },
                    result = &mut handshake => {
                        break Some(result.unwrap_or(Err(TransportError::Timeout(timeout))));
                    }
                }
            }
        };

        let Some(result) = result else {
            tracing::debug!(%url, "handshake abandoned");
            self.close_by_user().await;
            self.cancel_token.cancel();
            return;
        };

        match result {
            Ok(()) => {
                tracing::info!(%url, "channel open");
                self.attempt = 0;
                self.set_state(ConnectionState::Connected);
                self.error_tx.send_replace(None);
                self.emit(ConnectionEvent::Connected);
                self.send_probe().await;
                if self.state == ConnectionState::Connected {
                    self.flush_outbox().await;
                }
            }
            Err(TransportError::Unauthorized(status)) => {
                tracing::warn!(%url, status, "channel handshake rejected");
                self.set_state(ConnectionState::Disconnected);
                self.authentication_failed(format!("handshake rejected with HTTP {status}"));
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "channel open failed");
                self.set_state(ConnectionState::Disconnected);
                self.advise(ErrorClass::Transport, e.to_string());
                self.schedule_reconnect();
            }
        }

        for command in deferred {
            match command {
                Command::Send { message, batched } => self.submit(message, batched).await,
                Command::SetVisible(visible) => self.set_visible(visible),
                Command::Connect | Command::Close => {}
            }
        }
    }

    async fn close_by_user(&mut self) {
        self.closed_by_user = true;
        self.reconnect_at = None;
        if self.state == ConnectionState::Connected && !self.batcher.is_empty() {
            self.flush_batch().await;
        }
        self.heartbeat = Heartbeat::Off;
        self.flush_deadline = None;
        if let Err(e) = self.transport.disconnect().await {
            tracing::debug!(error = %e, "disconnect failed");
        }
        if self.state != ConnectionState::Disconnected {
            self.set_state(ConnectionState::Disconnected);
            self.emit(ConnectionEvent::Disconnected {
                code: Some(close_code::NORMAL),
                reconnect: false,
            });
        }
        tracing::info!("channel closed by user");
    }

    /// Tears down after an unplanned close and decides whether to retry.
    async fn connection_lost(&mut self, code: Option<u16>, reason: &str) {
        if self.transport.is_connected() {
            let _ = self.transport.disconnect().await;
        }
        self.heartbeat = Heartbeat::Off;
        self.flush_deadline = None;

        // Unacknowledged flushes and half-built batches go back to the outbox
        let in_flight = std::mem::take(&mut self.in_flight);
        if !in_flight.is_empty() {
            self.outbox.requeue_front(in_flight);
        }
        for message in self.batcher.take() {
            self.enqueue(message);
        }
        self.sync_outbox_len();
        self.set_state(ConnectionState::Disconnected);

        let kind = code.map(CloseKind::from_code).unwrap_or(CloseKind::Abnormal);
        match kind {
            CloseKind::AuthenticationFailed => {
                self.emit(ConnectionEvent::Disconnected {
                    code,
                    reconnect: false,
                });
                self.authentication_failed(format!(
                    "server closed the channel with {}",
                    close_code::AUTH_FAILED
                ));
            }
            CloseKind::Normal => {
                tracing::info!(?code, "channel closed normally");
                self.emit(ConnectionEvent::Disconnected {
                    code,
                    reconnect: false,
                });
            }
            CloseKind::Abnormal => {
                self.advise(ErrorClass::Transport, format!("connection lost: {reason}"));
                self.emit(ConnectionEvent::Disconnected {
                    code,
                    reconnect: !self.closed_by_user,
                });
                self.schedule_reconnect();
            }
        }
    }

    fn authentication_failed(&mut self, message: String) {
        tracing::error!(%message, "authentication failed, not reconnecting");
        self.reconnect_at = None;
        self.advise(ErrorClass::Authentication, message);
        self.emit(ConnectionEvent::AuthenticationFailed);
    }

    fn schedule_reconnect(&mut self) {
        if self.closed_by_user {
            return;
        }
        if self.attempt >= self.config.max_reconnect_attempts {
            tracing::error!(attempts = self.attempt, "giving up on reconnection");
            self.advise(
                ErrorClass::Transport,
                format!("gave up after {} reconnection attempts", self.attempt),
            );
            self.emit(ConnectionEvent::ReconnectExhausted {
                attempts: self.attempt,
            });
            return;
        }

        let delay = backoff::reconnect_delay(self.attempt);
        self.attempt += 1;
        self.reconnect_at = Some(Instant::now() + delay);
        tracing::info!(
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            paused = !self.visible,
            "reconnect scheduled"
        );
        self.emit(ConnectionEvent::ReconnectScheduled {
            attempt: self.attempt,
            delay,
        });
    }

    async fn send_probe(&mut self) {
        let probe = ChannelMessage::ping(SystemClock.now_ms());
        match self.transport.send(probe).await {
            Ok(()) => {
                self.heartbeat = Heartbeat::AwaitingPong {
                    deadline: Instant::now() + self.config.heartbeat_timeout,
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "probe failed");
                self.connection_lost(None, &e.to_string()).await;
            }
        }
    }

    async fn on_heartbeat_deadline(&mut self) {
        match self.heartbeat {
            Heartbeat::Idle { .. } => self.send_probe().await,
            Heartbeat::AwaitingPong { .. } => {
                tracing::warn!(
                    timeout_ms = self.config.heartbeat_timeout.as_millis() as u64,
                    "no pong before deadline, closing channel"
                );
                self.connection_lost(None, "heartbeat timeout").await;
            }
            Heartbeat::Off => {}
        }
    }

    async fn on_frame(&mut self, text: &str) {
        let message = match ChannelMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    class = %ErrorClass::Protocol,
                    "dropping malformed frame"
                );
                return;
            }
        };

        let frames = match message.body {
            MessageBody::Batch(members) => {
                if let Some(id) = &message.temp_id {
                    if !self.seen.insert(id) {
                        tracing::debug!(temp_id = %id, "dropping duplicate batch");
                        return;
                    }
                }
                members
            }
            _ => vec![message],
        };

        for frame in frames {
            match &frame.body {
                MessageBody::Ping => {
                    let pong = ChannelMessage::pong(SystemClock.now_ms());
                    if let Err(e) = self.transport.send(pong).await {
                        tracing::warn!(error = %e, "pong failed");
                        self.connection_lost(None, &e.to_string()).await;
                        return;
                    }
                }
                MessageBody::Pong => {
                    if let Heartbeat::AwaitingPong { .. } = self.heartbeat {
                        self.heartbeat = Heartbeat::Idle {
                            next_probe: Instant::now() + self.config.heartbeat_interval,
                        };
                    }
                }
                MessageBody::Ack => {
                    if let Some(id) = &frame.temp_id {
                        self.acknowledge(id);
                    }
                }
                MessageBody::Batch(_) => {
                    tracing::warn!(class = %ErrorClass::Protocol, "dropping nested batch");
                }
                _ => self.deliver(frame),
            }
        }
    }

    fn deliver(&mut self, message: ChannelMessage) {
        if let Some(id) = &message.temp_id {
            if !self.seen.insert(id) {
                tracing::debug!(temp_id = %id, "dropping duplicate message");
                return;
            }
        }
        self.emit(ConnectionEvent::Message(message));
    }

    fn acknowledge(&mut self, temp_id: &str) {
        let before = self.in_flight.len();
        self.in_flight.retain(|frame| !frame_has_id(frame, temp_id));
        if before != self.in_flight.len() && self.in_flight.is_empty() {
            tracing::debug!("flush acknowledged");
            self.flush_deadline = None;
        }
    }

    fn on_flush_stalled(&mut self) {
        self.flush_deadline = None;
        let unacked = self.in_flight.len();
        tracing::warn!(
            unacked,
            timeout_ms = self.config.flush_timeout.as_millis() as u64,
            "flush not acknowledged"
        );
        self.advise(
            ErrorClass::Transport,
            format!("{unacked} flushed messages not acknowledged"),
        );
        self.emit(ConnectionEvent::FlushStalled { unacked });
    }

    async fn submit(&mut self, message: ChannelMessage, batched: bool) {
        if batched && Batcher::accepts(&message) {
            if self.state != ConnectionState::Connected {
                self.enqueue(message);
                return;
            }
            if let Some(group) = self.batcher.push(message, Instant::now()) {
                self.transmit_group(group).await;
            }
            return;
        }
        self.dispatch(message).await;
    }

    async fn flush_batch(&mut self) {
        let group = self.batcher.take();
        self.transmit_group(group).await;
    }

    async fn transmit_group(&mut self, group: Vec<ChannelMessage>) {
        if let Some(frame) = batch::frame(group, SystemClock.now_ms()) {
            self.dispatch(frame).await;
        }
    }

    async fn dispatch(&mut self, message: ChannelMessage) {
        if self.state != ConnectionState::Connected {
            if message.body.is_probe() {
                return;
            }
            self.enqueue(message);
            return;
        }

        self.remember(&message);
        if let Err(e) = self.transport.send(message.clone()).await {
            tracing::warn!(error = %e, kind = message.kind(), "send failed, buffering");
            self.enqueue(message);
            self.connection_lost(None, &e.to_string()).await;
        }
    }

    async fn flush_outbox(&mut self) {
        let pending = self.outbox.drain_snapshot();
        self.sync_outbox_len();
        if pending.is_empty() {
            return;
        }
        tracing::info!(count = pending.len(), "flushing outbox");

        let mut remaining = pending.into_iter();
        while let Some(message) = remaining.next() {
            self.remember(&message);
            if let Err(e) = self.transport.send(message.clone()).await {
                let unsent: Vec<_> = std::iter::once(message).chain(remaining).collect();
                tracing::warn!(unsent = unsent.len(), error = %e, "flush interrupted");
                self.outbox.requeue_front(unsent);
                self.sync_outbox_len();
                self.connection_lost(None, &e.to_string()).await;
                return;
            }
            if message.temp_id.is_some() {
                self.in_flight.push(message);
            }
        }

        if !self.in_flight.is_empty() {
            self.flush_deadline = Some(Instant::now() + self.config.flush_timeout);
        }
    }

    fn enqueue(&mut self, message: ChannelMessage) {
        let outcome = self.outbox.push(message);
        self.sync_outbox_len();
        if outcome.evicted.is_some() && self.outbox.dropped() == 1 {
            self.advise(
                ErrorClass::Capacity,
                format!("outbox full ({}), dropping oldest messages", self.outbox.capacity()),
            );
        } else if outcome.escalated == Some(Pressure::Critical) {
            self.advise(
                ErrorClass::Capacity,
                format!(
                    "outbox at {}/{} messages",
                    self.outbox.len(),
                    self.outbox.capacity()
                ),
            );
        }
    }

    /// Outbound tempIds are remembered so server echoes are suppressed.
    fn remember(&mut self, message: &ChannelMessage) {
        if let Some(id) = &message.temp_id {
            self.seen.insert(id);
        }
        if let MessageBody::Batch(members) = &message.body {
            for member in members {
                if let Some(id) = &member.temp_id {
                    self.seen.insert(id);
                }
            }
        }
    }

    fn sync_outbox_len(&self) {
        self.outbox_len.store(self.outbox.len(), Ordering::Relaxed);
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn advise(&mut self, class: ErrorClass, message: impl Into<String>) {
        let advisory = Advisory::new(class, message);
        self.error_tx.send_replace(Some(advisory.clone()));
        self.emit(ConnectionEvent::Error(advisory));
    }

    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn frame_has_id(frame: &ChannelMessage, temp_id: &str) -> bool {
    if frame.temp_id.as_deref() == Some(temp_id) {
        return true;
    }
    match &frame.body {
        MessageBody::Batch(members) => members
            .iter()
            .any(|m| m.temp_id.as_deref() == Some(temp_id)),
        _ => false,
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
