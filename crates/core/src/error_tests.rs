// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    item_not_found = { Error::ItemNotFound("q-123".into()), "q-123" },
    conflict_not_found = { Error::ConflictNotFound("c-9".into()), "c-9" },
    invalid_priority = { Error::InvalidPriority(42), "between 1" },
    schema = { Error::SchemaVersion { found: 9, supported: 2 }, "version 9" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn invalid_item_state_display_has_hint() {
    let err = Error::InvalidItemState {
        id: "q-1".into(),
        status: "failed".into(),
        expected: "pending",
        action: "promoted",
    };
    let msg = err.to_string();
    assert!(msg.contains("q-1 is failed"));
    assert!(msg.contains("hint: only pending items can be promoted"));
}

#[test]
fn error_from_io_is_persistence() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(err.class(), ErrorClass::Persistence);
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}

#[parameterized(
    transport = { ErrorClass::Transport, false },
    protocol = { ErrorClass::Protocol, false },
    authentication = { ErrorClass::Authentication, true },
    capacity = { ErrorClass::Capacity, false },
    persistence = { ErrorClass::Persistence, false },
    conflict = { ErrorClass::Conflict, false },
    retry_exhausted = { ErrorClass::RetryExhausted, true },
)]
fn error_class_terminality(class: ErrorClass, terminal: bool) {
    assert_eq!(class.is_terminal(), terminal);
}

#[test]
fn advisory_display() {
    let advisory = Advisory::new(ErrorClass::Capacity, "outbox at 92%");
    assert_eq!(advisory.to_string(), "capacity: outbox at 92%");
}
