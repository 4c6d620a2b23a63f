// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the per-worker JSONL channels and signal files.

use serde::{Deserialize, Serialize};

/// Kind of a lead-to-worker inbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboxKind {
    /// A directive for the worker's next prompt.
    Message,
    /// Background context, injected the same way.
    Context,
}

/// Lead → worker message, one JSON line in the worker's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    #[serde(rename = "type")]
    pub kind: InboxKind,
    pub content: String,
    pub timestamp: String,
}

impl InboxMessage {
    pub fn new(kind: InboxKind, content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// Kind of a worker-to-lead outbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxKind {
    TaskComplete,
    TaskFailed,
    Idle,
    ShutdownAck,
    DrainAck,
    Heartbeat,
    Error,
}

/// Worker → lead message, one JSON line in the worker's outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    #[serde(rename = "type")]
    pub kind: OutboxKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl OutboxMessage {
    fn bare(kind: OutboxKind, timestamp: String) -> Self {
        Self {
            kind,
            task_id: None,
            summary: None,
            message: None,
            error: None,
            request_id: None,
            timestamp,
        }
    }

    pub fn task_complete(task_id: &str, summary: String, timestamp: String) -> Self {
        Self {
            task_id: Some(task_id.to_string()),
            summary: Some(summary),
            ..Self::bare(OutboxKind::TaskComplete, timestamp)
        }
    }

    pub fn task_failed(task_id: &str, error: String, timestamp: String) -> Self {
        Self {
            task_id: Some(task_id.to_string()),
            error: Some(error),
            ..Self::bare(OutboxKind::TaskFailed, timestamp)
        }
    }

    pub fn idle(timestamp: String) -> Self {
        Self::bare(OutboxKind::Idle, timestamp)
    }

    pub fn shutdown_ack(request_id: Option<String>, timestamp: String) -> Self {
        Self {
            request_id,
            ..Self::bare(OutboxKind::ShutdownAck, timestamp)
        }
    }

    pub fn error(message: String, task_id: Option<String>, timestamp: String) -> Self {
        Self {
            task_id,
            error: Some(message),
            ..Self::bare(OutboxKind::Error, timestamp)
        }
    }
}

/// Payload of a shutdown or drain signal file.
///
/// Presence of the file is the signal; the payload carries provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    pub request_id: String,
    pub reason: String,
    pub timestamp: String,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
