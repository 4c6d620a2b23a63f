// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dual-path worker registry.
//!
//! The canonical registry (`~/.claude/teams/{team}/config.json`) belongs to
//! an external consumer; we only write into it when a compatibility probe
//! has passed, and we preserve everything in the file we do not own. The
//! shadow registry (`.omc/state/team-mcp-workers.json`) is ours and is
//! always written; it wins on merge conflicts.

use crate::fsio::{self, FsError, FILE_MODE};
use crate::paths::TeamPaths;
use omc_core::MemberRecord;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io;
use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Result of the external compatibility probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    Pass,
    Fail,
    Partial,
}

/// Singleton probe record for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub probe_result: ProbeOutcome,
    pub probed_at: String,
    pub version: u32,
}

/// Where member registrations are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStrategy {
    /// Shadow plus the canonical registry.
    Canonical,
    /// Shadow only.
    Shadow,
}

/// A row of the canonical registry, parsed leniently.
///
/// The schema is owned by an external consumer, so everything beyond the
/// name is optional and unknown keys ride along in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalMember {
    pub name: String,
    pub agent_type: String,
    pub backend_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// On-disk shape of the shadow registry.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ShadowFile {
    workers: Vec<MemberRecord>,
}

/// The dual registry of one (user root, project root) pair.
#[derive(Clone)]
pub struct Registry {
    paths: TeamPaths,
}

impl Registry {
    pub fn new(paths: TeamPaths) -> Self {
        Self { paths }
    }

    pub fn read_probe_result(&self) -> Option<ProbeResult> {
        fsio::read_json_lenient(&self.paths.probe_result_path())
            .ok()
            .flatten()
    }

    pub fn write_probe_result(&self, probe: &ProbeResult) -> Result<(), RegistryError> {
        fsio::atomic_write_json(
            &self.paths.probe_result_path(),
            self.paths.project_root(),
            probe,
            FILE_MODE,
        )?;
        Ok(())
    }

    /// Anything but a passing probe (including no probe) selects shadow-only.
    pub fn registration_strategy(&self) -> RegistrationStrategy {
        match self.read_probe_result() {
            Some(probe) if probe.probe_result == ProbeOutcome::Pass => {
                RegistrationStrategy::Canonical
            }
            _ => RegistrationStrategy::Shadow,
        }
    }

    /// Register a worker: always in the shadow registry, and additionally
    /// in the canonical one when the probe passed. Both writes replace any
    /// prior record with the same name; canonical failures are non-fatal.
    pub fn register_mcp_worker(
        &self,
        team: &str,
        record: &MemberRecord,
    ) -> Result<RegistrationStrategy, RegistryError> {
        self.upsert_shadow(team, record)?;

        let strategy = self.registration_strategy();
        if strategy == RegistrationStrategy::Canonical {
            if let Err(e) = self.upsert_canonical(team, record) {
                tracing::warn!(team, worker = %record.name, error = %e,
                    "canonical registry update failed (non-fatal)");
            }
        }
        Ok(strategy)
    }

    /// Remove a worker from both registries.
    pub fn unregister_mcp_worker(&self, team: &str, worker: &str) -> Result<(), RegistryError> {
        let mut shadow = self.read_shadow()?;
        shadow
            .workers
            .retain(|m| !(m.name == worker && m.team_name() == Some(team)));
        self.write_shadow(&shadow)?;

        if let Err(e) = self.remove_canonical(team, worker) {
            tracing::warn!(team, worker, error = %e,
                "canonical registry removal failed (non-fatal)");
        }
        Ok(())
    }

    /// Merge both registries for a team. Shadow wins on a name collision;
    /// canonical rows that parse as member records contribute otherwise.
    pub fn list_mcp_workers(&self, team: &str) -> Result<Vec<MemberRecord>, RegistryError> {
        let shadow = self.read_shadow()?;
        let mut merged: Vec<MemberRecord> = shadow
            .workers
            .into_iter()
            .filter(|m| m.team_name() == Some(team))
            .collect();

        let canonical = self.read_canonical_value(team)?;
        if let Some(members) = canonical.get("members").and_then(Value::as_array) {
            for row in members {
                if let Ok(member) = serde_json::from_value::<MemberRecord>(row.clone()) {
                    if merged.iter().all(|m| m.name != member.name) {
                        merged.push(member);
                    }
                }
            }
        }
        merged.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(merged)
    }

    /// Every row of the canonical registry, parsed leniently. Used by the
    /// unified view, which must see foreign (non-MCP) members too.
    pub fn list_canonical_members(&self, team: &str) -> Result<Vec<CanonicalMember>, RegistryError> {
        let canonical = self.read_canonical_value(team)?;
        let mut rows = Vec::new();
        if let Some(members) = canonical.get("members").and_then(Value::as_array) {
            for row in members {
                if let Ok(member) = serde_json::from_value::<CanonicalMember>(row.clone()) {
                    if !member.name.is_empty() {
                        rows.push(member);
                    }
                }
            }
        }
        Ok(rows)
    }

    // ── Shadow back ──────────────────────────────────────────────────────

    fn read_shadow(&self) -> Result<ShadowFile, RegistryError> {
        Ok(fsio::read_json_lenient(&self.paths.shadow_registry_path())?.unwrap_or_default())
    }

    fn write_shadow(&self, shadow: &ShadowFile) -> Result<(), RegistryError> {
        fsio::atomic_write_json(
            &self.paths.shadow_registry_path(),
            self.paths.project_root(),
            shadow,
            FILE_MODE,
        )?;
        Ok(())
    }

    fn upsert_shadow(&self, team: &str, record: &MemberRecord) -> Result<(), RegistryError> {
        let mut shadow = self.read_shadow()?;
        shadow
            .workers
            .retain(|m| !(m.name == record.name && m.team_name() == Some(team)));
        shadow.workers.push(record.clone());
        self.write_shadow(&shadow)
    }

    // ── Canonical back ───────────────────────────────────────────────────

    fn read_canonical_value(&self, team: &str) -> Result<Value, RegistryError> {
        let path = self.paths.canonical_registry_path(team);
        Ok(fsio::read_json_lenient::<Value>(&path)?.unwrap_or_else(|| json!({ "members": [] })))
    }

    fn upsert_canonical(&self, team: &str, record: &MemberRecord) -> Result<(), RegistryError> {
        let mut canonical = self.read_canonical_value(team)?;
        let obj = canonical
            .as_object_mut()
            .ok_or_else(|| FsError::Json {
                path: self.paths.canonical_registry_path(team),
                source: serde_json::Error::io(io::Error::other("canonical registry is not an object")),
            })?;
        let members = obj
            .entry("members")
            .or_insert_with(|| json!([]));
        if !members.is_array() {
            *members = json!([]);
        }
        if let Some(array) = members.as_array_mut() {
            array.retain(|row| row.get("name").and_then(Value::as_str) != Some(&record.name));
            array.push(serde_json::to_value(record).unwrap_or(Value::Null));
        }

        fsio::atomic_write_json(
            &self.paths.canonical_registry_path(team),
            self.paths.user_root(),
            &canonical,
            FILE_MODE,
        )?;
        Ok(())
    }

    fn remove_canonical(&self, team: &str, worker: &str) -> Result<(), RegistryError> {
        let path = self.paths.canonical_registry_path(team);
        let Some(mut canonical) = fsio::read_json_lenient::<Value>(&path)? else {
            return Ok(());
        };
        let Some(members) = canonical.get_mut("members").and_then(Value::as_array_mut) else {
            return Ok(());
        };
        members.retain(|row| row.get("name").and_then(Value::as_str) != Some(worker));
        fsio::atomic_write_json(&path, self.paths.user_root(), &canonical, FILE_MODE)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
