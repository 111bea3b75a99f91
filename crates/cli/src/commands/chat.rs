// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Live chat session over the real-time channel.
//!
//! Lines read from stdin are sent to the conversation. While the channel is
//! down they go to the sync queue, which is drained every time the channel
//! comes back. Input commands:
//!
//! - `/typing`: send a typing indicator
//! - `/read <message-id>`: send a read receipt
//! - `/quit`: end the session

use std::sync::Arc;

use bz_core::{MessageBody, MutationSender};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::{ConnectionEvent, ConnectionManager, Delivery, SyncClient, WebSocketTransport};

use super::block_on;

pub fn run(config: &Config, conversation: &str) -> Result<()> {
    let queue = Arc::new(config.open_queue()?);
    let api = config.api()?;
    let transport =
        WebSocketTransport::new().with_auth_token(config.settings.server.auth_token.clone());
    let connection_config = config.connection_config();
    let url = connection_config.url.clone();

    block_on(async {
        let connection = ConnectionManager::spawn(connection_config, transport);
        let client = SyncClient::new(connection, queue);
        eprintln!("Joining {} on {} (/quit to leave)", conversation, url);
        let input = tokio::io::BufReader::new(tokio::io::stdin());
        let result = session(&client, &api, conversation, &url, input).await;
        client.shutdown().await;
        result
    })?
}

/// Drives one session until input ends, `/quit`, or a terminal event.
pub(crate) async fn session<R: AsyncBufRead + Unpin>(
    client: &SyncClient,
    sender: &dyn MutationSender,
    conversation: &str,
    url: &str,
    input: R,
) -> Result<()> {
    let mut events = client.connection().subscribe();
    client.connection().connect();
    let mut lines = input.lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(text) = describe(&event, conversation) {
                        println!("{}", text);
                    }
                    on_event(client, sender, conversation, url, event).await?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "chat session fell behind the event stream");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            line = lines.next_line() => match line? {
                Some(line) => match handle_line(client, conversation, &line) {
                    Ok(LineAction::Quit) => return Ok(()),
                    Ok(LineAction::Sent(Delivery::Queued { id })) => {
                        eprintln!("(offline) queued as {}", id);
                    }
                    Ok(LineAction::Sent(Delivery::Live { .. }) | LineAction::Ignored) => {}
                    Ok(LineAction::TypingDropped) => {
                        eprintln!("(offline) typing indicator dropped");
                    }
                    Err(Error::InvalidInput(message)) => eprintln!("{}", message),
                    Err(e) => return Err(e),
                },
                None => return Ok(()),
            },
        }
    }
}

/// Side effects of a connection event.
///
/// Reconnecting drains the sync queue. Terminal events end the session.
pub(crate) async fn on_event(
    client: &SyncClient,
    sender: &dyn MutationSender,
    conversation: &str,
    url: &str,
    event: ConnectionEvent,
) -> Result<()> {
    match event {
        ConnectionEvent::Connected => {
            let report = client.drain(sender).await?;
            if report.auth_failed {
                return Err(Error::AuthenticationFailed);
            }
            if report.succeeded > 0 {
                eprintln!("Delivered {} queued item(s)", report.succeeded);
            }
            Ok(())
        }
        ConnectionEvent::Message(message) => {
            if let (MessageBody::Chat(chat), Some(id)) = (&message.body, &message.temp_id) {
                if chat.conversation_id == conversation {
                    client.mark_read(conversation, id)?;
                }
            }
            Ok(())
        }
        ConnectionEvent::AuthenticationFailed => Err(Error::AuthenticationFailed),
        ConnectionEvent::ReconnectExhausted { attempts } => Err(Error::ReconnectExhausted {
            url: url.to_string(),
            attempts,
        }),
        _ => Ok(()),
    }
}

/// One line of session output for an event, if it deserves one.
pub(crate) fn describe(event: &ConnectionEvent, conversation: &str) -> Option<String> {
    match event {
        ConnectionEvent::Connected => Some("-- connected".to_string()),
        ConnectionEvent::Disconnected {
            reconnect: true, ..
        } => Some("-- connection lost".to_string()),
        ConnectionEvent::Disconnected { .. } => Some("-- disconnected".to_string()),
        ConnectionEvent::ReconnectScheduled { attempt, delay } => Some(format!(
            "-- reconnecting in {:.1}s (attempt {})",
            delay.as_secs_f64(),
            attempt
        )),
        ConnectionEvent::Error(advisory) => Some(format!("-- {}", advisory)),
        ConnectionEvent::FlushStalled { unacked } => Some(format!(
            "-- {} message(s) not yet acknowledged, will resend",
            unacked
        )),
        ConnectionEvent::Message(message) => match &message.body {
            MessageBody::Chat(chat) if chat.conversation_id == conversation => Some(format!(
                "{}: {}",
                chat.sender_id.as_deref().unwrap_or("?"),
                chat.body
            )),
            MessageBody::Typing(typing)
                if typing.conversation_id == conversation && typing.is_typing =>
            {
                Some("-- typing...".to_string())
            }
            _ => None,
        },
        ConnectionEvent::ReconnectExhausted { .. } | ConnectionEvent::AuthenticationFailed => None,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineAction {
    Quit,
    Sent(Delivery),
    TypingDropped,
    Ignored,
}

pub(crate) fn handle_line(
    client: &SyncClient,
    conversation: &str,
    line: &str,
) -> Result<LineAction> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineAction::Ignored);
    }
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => Ok(LineAction::Quit),
        ("/typing", _) => Ok(if client.send_typing(conversation, true) {
            LineAction::Ignored
        } else {
            LineAction::TypingDropped
        }),
        ("/read", id) if !id.trim().is_empty() => Ok(LineAction::Sent(
            client.mark_read(conversation, id.trim())?,
        )),
        ("/read", _) => Err(Error::InvalidInput("usage: /read <message-id>".to_string())),
        _ => Ok(LineAction::Sent(client.send_chat(conversation, line)?)),
    }
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
