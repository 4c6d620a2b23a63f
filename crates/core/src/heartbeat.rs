// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker liveness record.

use crate::member::Provider;
use serde::{Deserialize, Serialize};

/// What the worker's poll loop is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Polling,
    Executing,
    Shutdown,
    Quarantined,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Polling => write!(f, "polling"),
            WorkerStatus::Executing => write!(f, "executing"),
            WorkerStatus::Shutdown => write!(f, "shutdown"),
            WorkerStatus::Quarantined => write!(f, "quarantined"),
        }
    }
}

/// Freshness record rewritten by a worker on every poll cycle.
///
/// Absence of the file, or an age beyond the liveness window, means the
/// worker is dead. The record is owned exclusively by its worker; the lead
/// only reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub worker_name: String,
    pub team_name: String,
    pub provider: Provider,
    pub pid: u32,
    /// ISO-8601 UTC timestamp of the last poll.
    pub last_poll_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<String>,
    #[serde(default)]
    pub consecutive_errors: u32,
    pub status: WorkerStatus,
}
