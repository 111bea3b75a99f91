// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for IPC protocol types and framing.

#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use super::*;
use yare::parameterized;

#[parameterized(
    status = { DaemonRequest::Status },
    shutdown = { DaemonRequest::Shutdown },
    ping = { DaemonRequest::Ping },
    hello = { DaemonRequest::Hello { version: "0.1.0".to_string() } },
    fetch = { DaemonRequest::Fetch { request: HttpRequest::new("POST", "/api/offers").with_json_body(b"{\"amount\":40}".to_vec()) } },
    sync_now = { DaemonRequest::SyncNow },
    subscribe = { DaemonRequest::Subscribe },
)]
fn framing_roundtrip_request(request: DaemonRequest) {
    let mut buf = Vec::new();
    framing::write_message(&mut buf, &request).unwrap();

    let mut cursor = Cursor::new(buf);
    let decoded: DaemonRequest = framing::read_message(&mut cursor).unwrap();
    assert_eq!(request, decoded);
}

#[parameterized(
    status = { DaemonResponse::Status(DaemonStatus::new(1000, 100)) },
    shutting_down = { DaemonResponse::ShuttingDown },
    pong = { DaemonResponse::Pong },
    error = { DaemonResponse::Error { message: "test".to_string() } },
    hello = { DaemonResponse::Hello { version: "0.1.0".to_string() } },
    fetched = { DaemonResponse::Fetched { response: HttpResponse::new(200, Some("image/svg+xml"), b"<svg/>".to_vec()) } },
    queued = { DaemonResponse::Queued { id: "q-1".to_string() } },
    notice = { DaemonResponse::Notice { notice: Notice::SyncSuccess { id: "q-1".to_string() } } },
)]
fn framing_roundtrip_response(response: DaemonResponse) {
    let mut buf = Vec::new();
    framing::write_message(&mut buf, &response).unwrap();

    let mut cursor = Cursor::new(buf);
    let decoded: DaemonResponse = framing::read_message(&mut cursor).unwrap();
    assert_eq!(response, decoded);
}

#[test]
fn request_is_tagged_by_type() {
    let json = serde_json::to_value(DaemonRequest::SyncNow).unwrap();
    assert_eq!(json, serde_json::json!({"type": "SyncNow"}));
}

#[parameterized(
    queued = { Notice::SyncQueued { id: "q-1".into() }, "SYNC_QUEUED" },
    success = { Notice::SyncSuccess { id: "q-1".into() }, "SYNC_SUCCESS" },
    complete = { Notice::SyncComplete { processed: 3, succeeded: 2, failed: 1 }, "SYNC_COMPLETE" },
    failed = { Notice::SyncFailed { message: "offline".into() }, "SYNC_FAILED" },
    refresh = { Notice::PeriodicRefreshComplete { refreshed: 2, failed: 0 }, "PERIODIC_REFRESH_COMPLETE" },
    process = { Notice::ProcessSyncQueue, "PROCESS_SYNC_QUEUE" },
)]
fn notice_wire_names(notice: Notice, expected: &str) {
    let json = serde_json::to_value(&notice).unwrap();
    assert_eq!(json["type"], expected);

    let back: Notice = serde_json::from_value(json).unwrap();
    assert_eq!(back, notice);
}

#[test]
fn sync_complete_payload_is_flat() {
    let json = serde_json::to_value(Notice::SyncComplete {
        processed: 3,
        succeeded: 2,
        failed: 1,
    })
    .unwrap();
    assert_eq!(json["processed"], 3);
    assert_eq!(json["succeeded"], 2);
    assert_eq!(json["failed"], 1);
}

#[test]
fn status_defaults_missing_fields() {
    let status: DaemonStatus = serde_json::from_str(r#"{"pid": 7, "uptime_secs": 3}"#).unwrap();
    assert_eq!(status, DaemonStatus::new(7, 3));
}

#[test]
fn framing_rejects_oversized_length() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&((MAX_MESSAGE_SIZE as u32) + 1).to_be_bytes());
    let err = framing::read_message::<_, DaemonRequest>(&mut Cursor::new(buf)).unwrap_err();
    assert!(err.to_string().contains("message too large"));
}

#[test]
fn framing_refuses_to_write_oversized_message() {
    let response = DaemonResponse::Error {
        message: "x".repeat(MAX_MESSAGE_SIZE + 1),
    };
    let mut buf = Vec::new();
    assert!(framing::write_message(&mut buf, &response).is_err());
    assert!(buf.is_empty());
}

#[test]
fn framing_truncated_frame_is_error() {
    let mut buf = Vec::new();
    framing::write_message(&mut buf, &DaemonRequest::Ping).unwrap();
    buf.truncate(buf.len() - 1);
    assert!(framing::read_message::<_, DaemonRequest>(&mut Cursor::new(buf)).is_err());
}

#[tokio::test]
async fn async_framing_interoperates_with_blocking() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let request = DaemonRequest::Hello {
        version: "0.1.0".into(),
    };
    framing_async::write_message(&mut client, &request).await.unwrap();
    let received: DaemonRequest = framing_async::read_message(&mut server).await.unwrap();
    assert_eq!(received, request);

    // A frame written by the blocking codec decodes on the async side
    let mut blocking = Vec::new();
    framing::write_message(&mut blocking, &DaemonResponse::Pong).unwrap();
    let decoded: DaemonResponse = framing_async::read_message(&mut blocking.as_slice())
        .await
        .unwrap();
    assert_eq!(decoded, DaemonResponse::Pong);
}
