// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn inbox_message_wire_format() {
    let msg = InboxMessage::new(InboxKind::Message, "ship it", "2026-02-01T10:00:00.000Z");
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(
        json,
        r#"{"type":"message","content":"ship it","timestamp":"2026-02-01T10:00:00.000Z"}"#
    );

    let back: InboxMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn context_kind_is_lowercase() {
    let msg = InboxMessage::new(InboxKind::Context, "bg", "t");
    assert!(serde_json::to_string(&msg).unwrap().contains(r#""type":"context""#));
}

#[test]
fn outbox_task_complete_carries_only_relevant_fields() {
    let msg = OutboxMessage::task_complete("3", "done".to_string(), "t1".to_string());
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains(r#""type":"task_complete""#));
    assert!(json.contains(r#""taskId":"3""#));
    assert!(json.contains(r#""summary":"done""#));
    assert!(!json.contains("requestId"));
    assert!(!json.contains("error"));
}

#[test]
fn outbox_shutdown_ack_echoes_request_id() {
    let msg = OutboxMessage::shutdown_ack(Some("req-1".to_string()), "t".to_string());
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains(r#""type":"shutdown_ack""#));
    assert!(json.contains(r#""requestId":"req-1""#));
}

#[yare::parameterized(
    idle          = { OutboxKind::Idle, "idle" },
    task_failed   = { OutboxKind::TaskFailed, "task_failed" },
    drain_ack     = { OutboxKind::DrainAck, "drain_ack" },
    heartbeat     = { OutboxKind::Heartbeat, "heartbeat" },
    error         = { OutboxKind::Error, "error" },
)]
fn outbox_kinds_serialize_snake_case(kind: OutboxKind, expected: &str) {
    assert_eq!(
        serde_json::to_value(kind).unwrap(),
        serde_json::json!(expected)
    );
}

#[test]
fn signal_payload_round_trips() {
    let payload = SignalPayload {
        request_id: "r-1".to_string(),
        reason: "drain for deploy".to_string(),
        timestamp: "2026-02-01T10:00:00.000Z".to_string(),
    };
    let json = serde_json::to_string(&payload).unwrap();
    assert!(json.contains(r#""requestId":"r-1""#));
    let back: SignalPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(back, payload);
}

#[test]
fn outbox_deserializes_with_missing_optionals() {
    let msg: OutboxMessage =
        serde_json::from_str(r#"{"type":"idle","timestamp":"t"}"#).unwrap();
    assert_eq!(msg.kind, OutboxKind::Idle);
    assert!(msg.task_id.is_none());
}
