// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge process configuration.
//!
//! `BridgeConfig` is loaded once at startup, validated, and immutable after
//! that. Structural validation (names, enforcement values, dangerous
//! permission patterns) lives here; filesystem validation of the config
//! path and working directory lives in the binary's loader.

use crate::member::Provider;
use crate::name::{sanitize_name, NameError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from structural config validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("dangerous permission pattern: {0:?}")]
    DangerousPattern(String),
}

/// How the post-execution permission audit reacts to violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionEnforcement {
    /// No snapshots, no audit.
    #[default]
    Off,
    /// Violations are logged and appended to the completion summary.
    Audit,
    /// Violations permanently fail the task.
    Enforce,
}

/// Advisory permission policy for a worker.
///
/// Paths are globs, commands are prefixes, `max_file_size` is a byte cap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionsConfig {
    pub allowed_paths: Vec<String>,
    pub denied_paths: Vec<String>,
    pub allowed_commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
}

impl PermissionsConfig {
    /// Whether any restrictive field is set.
    pub fn is_restrictive(&self) -> bool {
        !self.allowed_paths.is_empty()
            || !self.denied_paths.is_empty()
            || !self.allowed_commands.is_empty()
            || self.max_file_size.is_some()
    }
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_task_timeout_ms() -> u64 {
    600_000
}

fn default_max_consecutive_errors() -> u32 {
    3
}

fn default_outbox_max_lines() -> usize {
    500
}

fn default_max_retries() -> u32 {
    5
}

/// Per-worker bridge configuration, loaded from `--config <file>`.
///
/// Never written back to disk; restarts re-synthesize it from the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    pub team_name: String,
    pub worker_name: String,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub working_directory: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    #[serde(default = "default_outbox_max_lines")]
    pub outbox_max_lines: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub permission_enforcement: PermissionEnforcement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionsConfig>,
}

impl BridgeConfig {
    /// Sanitize names and reject dangerous permission patterns.
    ///
    /// Mutates `team_name`/`worker_name` to their sanitized forms so every
    /// downstream path derivation sees the same spelling.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.team_name = sanitize_name(&self.team_name)?;
        self.worker_name = sanitize_name(&self.worker_name)?;

        if let Some(perms) = &self.permissions {
            for pattern in &perms.allowed_paths {
                if is_dangerous_pattern(pattern) {
                    return Err(ConfigError::DangerousPattern(pattern.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Overly permissive patterns rejected in `allowedPaths`.
///
/// A bare `*`/`**` allows everything, defeating the deny-defaults; a
/// leading `!` is a negation shorthand we do not support.
fn is_dangerous_pattern(pattern: &str) -> bool {
    matches!(pattern, "*" | "**") || pattern.starts_with('!')
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
