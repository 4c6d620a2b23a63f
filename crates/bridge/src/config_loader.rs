// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge config loading and validation.
//!
//! The config file must resolve under the user's home directory with a
//! trusted subpath marker, and the working directory must be a real git
//! worktree under home. Symlinks are resolved before every prefix check,
//! so a symlinked parent cannot smuggle a path out of home.

use omc_core::{BridgeConfig, ConfigError};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subpath markers a trusted config path must carry.
const TRUSTED_MARKERS: [&str; 2] = ["/.claude/", "/.omc/"];

/// Errors from config loading.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("config file not found or unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config path resolves outside the home directory: {0}")]
    OutsideHome(PathBuf),
    #[error("config path lacks a trusted marker (.claude/ or .omc/): {0}")]
    UntrustedPath(PathBuf),
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
    #[error("working directory invalid: {path}: {reason}")]
    WorkingDirectory { path: PathBuf, reason: String },
}

/// Load and validate a bridge config from a trusted location.
pub fn load_bridge_config(config_path: &Path, home: &Path) -> Result<BridgeConfig, LoaderError> {
    let home = home
        .canonicalize()
        .map_err(|e| LoaderError::Unreadable {
            path: home.to_path_buf(),
            source: e,
        })?;

    // Resolution first: a `..`-laden path is normalized before any check.
    let resolved = config_path
        .canonicalize()
        .map_err(|e| LoaderError::Unreadable {
            path: config_path.to_path_buf(),
            source: e,
        })?;
    if !resolved.starts_with(&home) {
        return Err(LoaderError::OutsideHome(resolved));
    }

    // Re-resolve the containing directory on its own: a parent that is a
    // symlink out of home fails here even if the file check passed.
    if let Some(parent) = config_path.parent() {
        let resolved_parent = parent
            .canonicalize()
            .map_err(|e| LoaderError::Unreadable {
                path: parent.to_path_buf(),
                source: e,
            })?;
        if !resolved_parent.starts_with(&home) {
            return Err(LoaderError::OutsideHome(resolved_parent));
        }
    }

    let resolved_str = resolved.display().to_string();
    if !TRUSTED_MARKERS.iter().any(|m| resolved_str.contains(m)) {
        return Err(LoaderError::UntrustedPath(resolved));
    }

    let content = std::fs::read_to_string(&resolved).map_err(|e| LoaderError::Unreadable {
        path: resolved.clone(),
        source: e,
    })?;
    let mut config: BridgeConfig = serde_json::from_str(&content)?;
    config.validate()?;
    validate_working_directory(&config.working_directory, &home)?;
    Ok(config)
}

fn working_dir_error(path: &Path, reason: impl Into<String>) -> LoaderError {
    LoaderError::WorkingDirectory {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// The working directory must exist, be a directory, resolve under home,
/// and be inside a git worktree.
fn validate_working_directory(dir: &Path, home: &Path) -> Result<(), LoaderError> {
    let resolved = dir
        .canonicalize()
        .map_err(|e| working_dir_error(dir, format!("does not exist: {}", e)))?;
    if !resolved.is_dir() {
        return Err(working_dir_error(dir, "not a directory"));
    }
    if !resolved.starts_with(home) {
        return Err(working_dir_error(dir, "resolves outside the home directory"));
    }

    let inside = std::process::Command::new("git")
        .arg("-C")
        .arg(&resolved)
        .args(["rev-parse", "--is-inside-work-tree"])
        .output()
        .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).trim() == "true")
        .unwrap_or(false);
    if !inside {
        return Err(working_dir_error(dir, "not inside a git worktree"));
    }
    Ok(())
}

/// Project root for a worker's working directory.
///
/// Worktrees live under `<repoRoot>/.omc/worktrees/…`, so the shared
/// project root is the directory holding the common git dir, not the
/// worktree's own top level.
pub fn discover_project_root(working_directory: &Path) -> Result<PathBuf, LoaderError> {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(working_directory)
        .args(["rev-parse", "--git-common-dir"])
        .output()
        .map_err(|e| working_dir_error(working_directory, format!("git unavailable: {}", e)))?;
    if !output.status.success() {
        return Err(working_dir_error(
            working_directory,
            "git rev-parse --git-common-dir failed",
        ));
    }

    let common_dir = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
    let absolute = if common_dir.is_absolute() {
        common_dir
    } else {
        working_directory.join(common_dir)
    };
    let resolved = absolute
        .canonicalize()
        .map_err(|e| working_dir_error(&absolute, format!("unresolvable git dir: {}", e)))?;
    resolved
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| working_dir_error(&resolved, "git dir has no parent"))
}

#[cfg(test)]
#[path = "config_loader_tests.rs"]
mod tests;
