// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical filesystem layout for team state.
//!
//! Two roots: the user-scoped root (the user's home directory) for teams
//! shared across projects, and the project-scoped root (the project working
//! directory) for project-local state under `.omc/`. Every consumer derives
//! paths through this type so the layout has a single owner.

use std::path::{Path, PathBuf};

/// Path derivations for one (user root, project root) pair.
#[derive(Debug, Clone)]
pub struct TeamPaths {
    user_root: PathBuf,
    project_root: PathBuf,
}

impl TeamPaths {
    pub fn new(user_root: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            user_root: user_root.into(),
            project_root: project_root.into(),
        }
    }

    pub fn user_root(&self) -> &Path {
        &self.user_root
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    // ── User-scoped: teams ───────────────────────────────────────────────

    pub fn team_dir(&self, team: &str) -> PathBuf {
        self.user_root.join(".claude").join("teams").join(team)
    }

    pub fn inbox_path(&self, team: &str, worker: &str) -> PathBuf {
        self.team_dir(team).join("inbox").join(format!("{}.jsonl", worker))
    }

    pub fn inbox_cursor_path(&self, team: &str, worker: &str) -> PathBuf {
        self.team_dir(team).join("inbox").join(format!("{}.offset", worker))
    }

    pub fn outbox_path(&self, team: &str, worker: &str) -> PathBuf {
        self.team_dir(team).join("outbox").join(format!("{}.jsonl", worker))
    }

    pub fn outbox_cursor_path(&self, team: &str, worker: &str) -> PathBuf {
        self.team_dir(team).join("outbox").join(format!("{}.offset", worker))
    }

    pub fn shutdown_signal_path(&self, team: &str, worker: &str) -> PathBuf {
        self.team_dir(team)
            .join("signals")
            .join(format!("{}.shutdown", worker))
    }

    pub fn drain_signal_path(&self, team: &str, worker: &str) -> PathBuf {
        self.team_dir(team)
            .join("signals")
            .join(format!("{}.drain", worker))
    }

    /// The canonical registry file, schema-owned by an external consumer.
    pub fn canonical_registry_path(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("config.json")
    }

    // ── User-scoped: tasks ───────────────────────────────────────────────

    pub fn tasks_dir(&self, team: &str) -> PathBuf {
        self.user_root.join(".claude").join("tasks").join(team)
    }

    pub fn task_path(&self, team: &str, id: &str) -> PathBuf {
        self.tasks_dir(team).join(format!("{}.json", id))
    }

    pub fn task_lock_path(&self, team: &str, id: &str) -> PathBuf {
        self.tasks_dir(team).join(format!("{}.lock", id))
    }

    pub fn task_failure_path(&self, team: &str, id: &str) -> PathBuf {
        self.tasks_dir(team).join(format!("{}.failure.json", id))
    }

    // ── Project-scoped: state ────────────────────────────────────────────

    pub fn state_dir(&self) -> PathBuf {
        self.project_root.join(".omc").join("state")
    }

    pub fn bridge_state_dir(&self, team: &str) -> PathBuf {
        self.state_dir().join("team-bridge").join(team)
    }

    pub fn heartbeat_path(&self, team: &str, worker: &str) -> PathBuf {
        self.bridge_state_dir(team)
            .join(format!("{}.heartbeat.json", worker))
    }

    pub fn restart_state_path(&self, team: &str, worker: &str) -> PathBuf {
        self.bridge_state_dir(team)
            .join(format!("{}.restart.json", worker))
    }

    pub fn shadow_registry_path(&self) -> PathBuf {
        self.state_dir().join("team-mcp-workers.json")
    }

    pub fn probe_result_path(&self) -> PathBuf {
        self.state_dir().join("config-probe-result.json")
    }

    // ── Project-scoped: logs and artefacts ───────────────────────────────

    pub fn logs_dir(&self) -> PathBuf {
        self.project_root.join(".omc").join("logs")
    }

    pub fn audit_log_path(&self, team: &str) -> PathBuf {
        self.logs_dir().join(format!("team-bridge-{}.jsonl", team))
    }

    pub fn usage_log_path(&self, team: &str) -> PathBuf {
        self.logs_dir().join(format!("team-usage-{}.jsonl", team))
    }

    pub fn worktrees_dir(&self, team: &str) -> PathBuf {
        self.project_root.join(".omc").join("worktrees").join(team)
    }

    pub fn worktree_path(&self, team: &str, worker: &str) -> PathBuf {
        self.worktrees_dir(team).join(worker)
    }

    /// Sidecar metadata for a worker's worktree, next to the worktree itself.
    pub fn worktree_record_path(&self, team: &str, worker: &str) -> PathBuf {
        self.worktrees_dir(team).join(format!("{}.json", worker))
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.project_root.join(".omc").join("prompts")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.project_root.join(".omc").join("outputs")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.project_root.join(".omc").join("reports")
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
