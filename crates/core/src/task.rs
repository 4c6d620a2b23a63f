// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records and the per-task failure sidecar.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of a task.
///
/// `Completed` is terminal: a completed task never changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A unit of work in the shared team queue.
///
/// Unknown fields are preserved through read-modify-write via the flattened
/// `extra` map so that foreign writers' keys survive our updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    /// Worker name that may claim this task; empty means auto-routable.
    #[serde(default)]
    pub owner: String,
    /// Task ids this task unblocks.
    #[serde(default)]
    pub blocks: Vec<String>,
    /// Task ids that must be completed before this one may start.
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Last worker that obtained the exclusive claim lock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    /// Epoch milliseconds of the last claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_pid: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Create a pending task with no blockers.
    pub fn new(id: impl Into<String>, subject: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            owner: owner.into(),
            blocks: Vec::new(),
            blocked_by: Vec::new(),
            metadata: None,
            claimed_by: None,
            claimed_at: None,
            claim_pid: None,
            extra: Map::new(),
        }
    }

    /// Mutable access to the metadata map, creating it on first use.
    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        self.metadata.get_or_insert_with(Map::new)
    }

    /// Whether `metadata.permanentlyFailed` is set.
    pub fn is_permanently_failed(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("permanentlyFailed"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Whether this pending task is claimable by `worker` (blockers aside).
    pub fn is_claimable_by(&self, worker: &str) -> bool {
        self.status == TaskStatus::Pending && self.owner == worker
    }
}

/// Per-task failure sidecar, stored next to the task record.
///
/// `retry_count` only ever increases; retries are gated against it by the
/// task store, never by the sidecar itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailure {
    pub task_id: String,
    pub last_error: String,
    pub retry_count: u32,
    pub last_failed_at: String,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
