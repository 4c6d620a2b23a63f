// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability-scored task routing and message fan-out.

use crate::error::BridgeError;
use crate::view::{MemberView, StatusProjection};
use omc_core::{InboxKind, InboxMessage, Task};
use omc_store::Mailbox;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The canonical host's native backend kind.
pub const BACKEND_CLAUDE_NATIVE: &str = "claude-native";

/// Default capability set per backend/agent type.
///
/// The schema has no per-member capability field yet, so these stand in
/// until it grows one.
pub fn default_capabilities(agent_type: &str) -> Vec<String> {
    let caps: &[&str] = match agent_type {
        "mcp-claude" => &["code", "review", "general"],
        "mcp-codex" => &["code", "general"],
        BACKEND_CLAUDE_NATIVE => &["general"],
        _ => &["general"],
    };
    caps.iter().map(|s| s.to_string()).collect()
}

/// Fitness of a worker for a required capability set.
///
/// 1.0 per capability the worker has, 0.5 when it only has the `general`
/// wildcard, 0 otherwise; averaged. An empty requirement fits everyone.
pub fn score_worker_fitness(capabilities: &[String], required: &[String]) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let has_general = capabilities.iter().any(|c| c == "general");
    let total: f64 = required
        .iter()
        .map(|need| {
            if capabilities.iter().any(|c| c == need) {
                1.0
            } else if has_general {
                0.5
            } else {
                0.0
            }
        })
        .sum();
    total / required.len() as f64
}

/// One routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDecision {
    pub task_id: String,
    pub assigned_to: String,
    pub backend: String,
    pub reason: String,
    pub confidence: f64,
}

/// Assign unowned tasks to live members, balancing load as we go.
///
/// Members that are dead or quarantined are excluded. Each tentative
/// assignment raises that member's load, nudging later tasks elsewhere.
/// Ties keep insertion order.
pub fn route_tasks(
    members: &[MemberView],
    unassigned: &[Task],
    required_by_task: &HashMap<String, Vec<String>>,
) -> Vec<RouteDecision> {
    let candidates: Vec<&MemberView> = members
        .iter()
        .filter(|m| {
            !matches!(
                m.status,
                StatusProjection::Dead | StatusProjection::Quarantined
            )
        })
        .collect();

    let mut load: HashMap<&str, u32> = HashMap::new();
    let mut decisions = Vec::new();

    for task in unassigned {
        let required = required_by_task
            .get(&task.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut best: Option<(&MemberView, f64)> = None;
        for member in &candidates {
            let fitness = score_worker_fitness(&member.capabilities, required);
            if fitness <= 0.0 {
                continue;
            }
            let current_load = *load.get(member.name.as_str()).unwrap_or(&0) as f64;
            let idle_bonus = if member.status == StatusProjection::Idle {
                0.1
            } else {
                0.0
            };
            let score = (fitness - 0.2 * current_load + idle_bonus).clamp(0.0, 1.0);
            // Strict greater keeps the first of equals (insertion order).
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((member, score));
            }
        }

        if let Some((member, score)) = best {
            *load.entry(member.name.as_str()).or_insert(0) += 1;
            decisions.push(RouteDecision {
                task_id: task.id.clone(),
                assigned_to: member.name.clone(),
                backend: member.backend_type.clone(),
                reason: format!("score {:.2} for {:?}", score, required),
                confidence: score,
            });
        }
    }
    decisions
}

/// Where a message to a member must go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRoute {
    /// The recipient is native to the canonical host; the caller should
    /// use the host's own send operation.
    Native { recipient: String },
    /// Appended to the recipient's inbox.
    Delivered,
}

/// Route one message to a team member.
pub fn route_message(
    members: &[MemberView],
    mailbox: &Mailbox,
    team: &str,
    recipient: &str,
    content: &str,
    timestamp: &str,
) -> Result<MessageRoute, BridgeError> {
    let member = members
        .iter()
        .find(|m| m.name == recipient)
        .ok_or_else(|| BridgeError::MemberNotFound(recipient.to_string()))?;

    if member.backend_type == BACKEND_CLAUDE_NATIVE {
        return Ok(MessageRoute::Native {
            recipient: recipient.to_string(),
        });
    }

    mailbox.append_inbox(
        team,
        recipient,
        &InboxMessage::new(InboxKind::Message, content, timestamp),
    )?;
    Ok(MessageRoute::Delivered)
}

/// Fan a message out to the whole team.
///
/// MCP-backed members get inbox lines; the native group is returned for
/// the caller to handle through the host.
pub fn broadcast_to_team(
    members: &[MemberView],
    mailbox: &Mailbox,
    team: &str,
    content: &str,
    timestamp: &str,
) -> Result<Vec<String>, BridgeError> {
    let mut native = Vec::new();
    for member in members {
        if member.backend_type == BACKEND_CLAUDE_NATIVE {
            native.push(member.name.clone());
            continue;
        }
        mailbox.append_inbox(
            team,
            &member.name,
            &InboxMessage::new(InboxKind::Message, content, timestamp),
        )?;
    }
    Ok(native)
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
