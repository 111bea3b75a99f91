// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bz_core::ChannelMessage;
use tokio::sync::mpsc;

use super::transport::{Inbound, Transport, TransportError, TransportResult};

/// How a scripted connect attempt ends.
#[derive(Debug, Clone, Copy)]
pub enum ConnectOutcome {
    Fail,
    Reject(u16),
    /// The handshake never completes.
    Hang,
}

/// Mock transport for testing without real sockets.
///
/// Inbound frames are pushed through a [`MockHandle`]; everything sent is
/// recorded there too.
pub struct MockTransport {
    connected: bool,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<ChannelMessage>>,
    connect_script: Mutex<VecDeque<ConnectOutcome>>,
    failing_sends: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

/// Test-side control of a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    inbound: mpsc::UnboundedSender<Inbound>,
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        (
            MockTransport {
                connected: false,
                inbound: rx,
                shared: Arc::clone(&shared),
            },
            MockHandle { inbound: tx, shared },
        )
    }
}

impl MockHandle {
    /// Queues a parsed frame for the client to receive.
    pub fn push(&self, message: &ChannelMessage) {
        self.push_text(&message.to_json().unwrap());
    }

    pub fn push_text(&self, text: &str) {
        let _ = self.inbound.send(Inbound::Text(text.to_string()));
    }

    /// Closes the channel from the server side.
    pub fn close(&self, code: Option<u16>) {
        let _ = self.inbound.send(Inbound::Closed(code));
    }

    /// Scripts the outcome of upcoming connect attempts. Unscripted ones succeed.
    pub fn script_connects(&self, outcomes: &[ConnectOutcome]) {
        self.shared
            .connect_script
            .lock()
            .unwrap()
            .extend(outcomes.iter().copied());
    }

    /// Makes the next `n` sends fail.
    pub fn fail_sends(&self, n: usize) {
        self.shared.failing_sends.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<ChannelMessage> {
        self.shared.sent.lock().unwrap().clone()
    }

    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent().iter().map(|m| m.kind().to_string()).collect()
    }

    pub fn clear_sent(&self) {
        self.shared.sent.lock().unwrap().clear();
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.shared.disconnects.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        _url: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.shared.connects.fetch_add(1, Ordering::SeqCst);
            let outcome = self.shared.connect_script.lock().unwrap().pop_front();
            match outcome {
                Some(ConnectOutcome::Fail) => {
                    Err(TransportError::ConnectionFailed("mock failure".into()))
                }
                Some(ConnectOutcome::Reject(status)) => Err(TransportError::Unauthorized(status)),
                Some(ConnectOutcome::Hang) => std::future::pending().await,
                None => {
                    self.connected = true;
                    Ok(())
                }
            }
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.connected {
                self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
            }
            self.connected = false;
            Ok(())
        })
    }

    fn send(
        &mut self,
        msg: ChannelMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            let failing = self.shared.failing_sends.load(Ordering::SeqCst);
            if failing > 0 {
                self.shared.failing_sends.store(failing - 1, Ordering::SeqCst);
                self.connected = false;
                return Err(TransportError::SendFailed("mock send failure".into()));
            }
            self.shared.sent.lock().unwrap().push(msg);
            Ok(())
        })
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<Inbound>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            match self.inbound.recv().await {
                Some(Inbound::Closed(code)) => {
                    self.connected = false;
                    Ok(Inbound::Closed(code))
                }
                Some(frame) => Ok(frame),
                None => std::future::pending().await,
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
