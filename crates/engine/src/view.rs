// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified team membership view.
//!
//! Merges the canonical registry (minus rows that are really ours, to
//! avoid double counting) with the shadow registry, and projects each MCP
//! worker's heartbeat onto a coarse status.

use crate::error::BridgeError;
use crate::router::default_capabilities;
use chrono::{DateTime, Utc};
use omc_core::{Heartbeat, WorkerStatus};
use omc_store::{heartbeat_is_fresh, HeartbeatStore, Registry};
use serde::{Deserialize, Serialize};

/// Default heartbeat liveness window.
pub const DEFAULT_LIVENESS_MS: u64 = 30_000;

/// Coarse status of a member as seen by the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusProjection {
    Active,
    Idle,
    Dead,
    Quarantined,
    Unknown,
}

/// One row of the unified view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub name: String,
    pub agent_type: String,
    pub backend_type: String,
    pub status: StatusProjection,
    pub capabilities: Vec<String>,
}

/// Project a heartbeat onto the unified status.
///
/// Stale beats dead regardless of the recorded status; an absent
/// heartbeat is unknown (the session may still exist; deliberately not
/// resolved here).
pub fn project_status(
    heartbeat: Option<&Heartbeat>,
    max_age_ms: u64,
    now: DateTime<Utc>,
) -> StatusProjection {
    let Some(heartbeat) = heartbeat else {
        return StatusProjection::Unknown;
    };
    if !heartbeat_is_fresh(heartbeat, max_age_ms, now) {
        return StatusProjection::Dead;
    }
    match heartbeat.status {
        WorkerStatus::Executing => StatusProjection::Active,
        WorkerStatus::Polling => StatusProjection::Idle,
        WorkerStatus::Quarantined => StatusProjection::Quarantined,
        WorkerStatus::Shutdown => StatusProjection::Unknown,
    }
}

/// Aggregate live membership of a team.
///
/// Canonical rows with a `tmux` backend are skipped (the shadow registry
/// is authoritative for those); shadow rows get a heartbeat-derived
/// status. Foreign canonical rows come through as `unknown`.
pub fn team_members(
    registry: &Registry,
    heartbeats: &HeartbeatStore,
    team: &str,
    max_age_ms: u64,
    now: DateTime<Utc>,
) -> Result<Vec<MemberView>, BridgeError> {
    let mut views = Vec::new();

    for row in registry.list_canonical_members(team)? {
        if row.backend_type == omc_core::BACKEND_TMUX {
            continue;
        }
        views.push(MemberView {
            capabilities: default_capabilities(&row.agent_type),
            name: row.name,
            agent_type: row.agent_type,
            backend_type: row.backend_type,
            status: StatusProjection::Unknown,
        });
    }

    for member in registry.list_mcp_workers(team)? {
        if !member.is_mcp_worker() {
            continue;
        }
        let heartbeat = heartbeats.read(team, &member.name)?;
        let status = project_status(heartbeat.as_ref(), max_age_ms, now);
        views.push(MemberView {
            capabilities: default_capabilities(&member.agent_type),
            name: member.name,
            agent_type: member.agent_type,
            backend_type: member.backend_type,
            status,
        });
    }

    Ok(views)
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
