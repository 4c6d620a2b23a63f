// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker membership records shared between the two registries.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backend type marker for bridge-managed workers.
pub const BACKEND_TMUX: &str = "tmux";

/// External generative CLI wrapped by a worker.
///
/// `Claude` speaks line-delimited structured output on stdout; `Codex` is a
/// plain-text CLI. Adding a provider means growing this enum and the
/// prompt/spawn switches that match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    Codex,
}

impl Provider {
    /// The `agentType` registry value for this provider.
    pub fn agent_type(&self) -> &'static str {
        match self {
            Provider::Claude => "mcp-claude",
            Provider::Codex => "mcp-codex",
        }
    }

    /// Reverse of [`Provider::agent_type`].
    pub fn from_agent_type(agent_type: &str) -> Option<Self> {
        match agent_type {
            "mcp-claude" => Some(Provider::Claude),
            "mcp-codex" => Some(Provider::Codex),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Codex => "codex",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A worker's membership record.
///
/// At most one record exists per `(team, name)` across both registries;
/// re-registration replaces the prior record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    /// `"{workerName}@{teamName}"`.
    pub agent_id: String,
    pub name: String,
    /// `"mcp-claude"`, `"mcp-codex"`, or a foreign value from the canonical
    /// registry (e.g. `"claude-native"`).
    pub agent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Epoch milliseconds of registration.
    pub joined_at: u64,
    /// Terminal-multiplexer session name hosting the worker.
    pub session_id: String,
    /// Worktree path the worker runs in.
    pub cwd: PathBuf,
    pub backend_type: String,
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

impl MemberRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        team: &str,
        worker: &str,
        provider: Provider,
        model: Option<String>,
        session_id: String,
        cwd: PathBuf,
        joined_at: u64,
    ) -> Self {
        Self {
            agent_id: format!("{}@{}", worker, team),
            name: worker.to_string(),
            agent_type: provider.agent_type().to_string(),
            model,
            joined_at,
            session_id,
            cwd,
            backend_type: BACKEND_TMUX.to_string(),
            subscriptions: Vec::new(),
        }
    }

    /// Whether this member is a bridge-managed MCP worker.
    pub fn is_mcp_worker(&self) -> bool {
        self.backend_type == BACKEND_TMUX
    }

    /// Provider, when this is an MCP worker record.
    pub fn provider(&self) -> Option<Provider> {
        Provider::from_agent_type(&self.agent_type)
    }

    /// Team name parsed from the `agentId`.
    pub fn team_name(&self) -> Option<&str> {
        self.agent_id.split_once('@').map(|(_, team)| team)
    }
}

#[cfg(test)]
#[path = "member_tests.rs"]
mod tests;
