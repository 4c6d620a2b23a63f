// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree and merge coordination.
//!
//! One branch and one worktree per worker. Conflict checks are
//! non-destructive (merge-base double diff); real merges insist on a clean
//! tree and always abort on failure so history is preserved. Branch names
//! are validated before reaching any git argv.

use crate::subprocess::{run_command, GIT_TIMEOUT};
use omc_core::{iso_now, validate_branch_name, NameError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from git coordination.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {context} failed: {message}")]
    Command { context: String, message: String },
    #[error("working tree is dirty, refusing to merge")]
    DirtyWorkTree,
    #[error(transparent)]
    InvalidBranch(#[from] NameError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialize error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sidecar metadata for a worker's worktree.
///
/// A hint only: cleanup reconciles against `git worktree list`, since
/// parsing that output is brittle across git versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeRecord {
    pub path: PathBuf,
    pub branch: String,
    pub worker_name: String,
    pub team_name: String,
    pub created_at: String,
}

/// Result of one merge attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub success: bool,
    pub conflicts: Vec<String>,
    pub merge_commit: Option<String>,
}

/// Canonical branch name for a worker: `omc-team/{team}/{worker}`.
pub fn worker_branch_name(team: &str, worker: &str) -> String {
    format!("omc-team/{}/{}", team, worker)
}

/// Worktree location for a worker under the repository root.
pub fn worker_worktree_path(repo_root: &Path, team: &str, worker: &str) -> PathBuf {
    repo_root
        .join(".omc")
        .join("worktrees")
        .join(team)
        .join(worker)
}

fn worktree_record_path(repo_root: &Path, team: &str, worker: &str) -> PathBuf {
    repo_root
        .join(".omc")
        .join("worktrees")
        .join(team)
        .join(format!("{}.json", worker))
}

async fn git(repo: &Path, args: &[&str], context: &str) -> Result<std::process::Output, GitError> {
    let mut argv: Vec<OsString> = vec!["-C".into(), repo.as_os_str().to_os_string()];
    argv.extend(args.iter().map(OsString::from));
    run_command("git", argv, GIT_TIMEOUT, context)
        .await
        .map_err(|e| GitError::Command {
            context: context.to_string(),
            message: e.to_string(),
        })
}

/// Run git, requiring a zero exit; returns trimmed stdout.
async fn git_ok(repo: &Path, args: &[&str], context: &str) -> Result<String, GitError> {
    let output = git(repo, args, context).await?;
    if !output.status.success() {
        return Err(GitError::Command {
            context: context.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// ── Worktree lifecycle ───────────────────────────────────────────────────

/// Create a fresh worktree and branch for a worker.
///
/// Prunes stale worktrees, force-removes any existing worktree and branch
/// under the target names, then creates the worktree on a new branch
/// forking from `base_branch` (or HEAD). Persists the sidecar record.
pub async fn create_worker_worktree(
    team: &str,
    worker: &str,
    repo_root: &Path,
    base_branch: Option<&str>,
) -> Result<WorktreeRecord, GitError> {
    let branch = worker_branch_name(team, worker);
    validate_branch_name(&branch)?;
    if let Some(base) = base_branch {
        validate_branch_name(base)?;
    }

    let path = worker_worktree_path(repo_root, team, worker);

    let _ = git(repo_root, &["worktree", "prune"], "worktree prune").await;
    let _ = git(
        repo_root,
        &["worktree", "remove", "--force", &path.display().to_string()],
        "worktree remove",
    )
    .await;
    let _ = git(repo_root, &["branch", "-D", &branch], "branch delete").await;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let path_arg = path.display().to_string();
    let mut args = vec!["worktree", "add", "-b", &branch, &path_arg];
    if let Some(base) = base_branch {
        args.push(base);
    }
    git_ok(repo_root, &args, "worktree add").await?;

    let record = WorktreeRecord {
        path,
        branch,
        worker_name: worker.to_string(),
        team_name: team.to_string(),
        created_at: iso_now(),
    };
    write_record(&worktree_record_path(repo_root, team, worker), &record)?;

    tracing::info!(team, worker, branch = %record.branch, "created worker worktree");
    Ok(record)
}

/// Remove a worker's worktree, branch, and sidecar record.
pub async fn remove_worker_worktree(
    team: &str,
    worker: &str,
    repo_root: &Path,
) -> Result<(), GitError> {
    let branch = worker_branch_name(team, worker);
    validate_branch_name(&branch)?;
    let path = worker_worktree_path(repo_root, team, worker);

    let _ = git(
        repo_root,
        &["worktree", "remove", "--force", &path.display().to_string()],
        "worktree remove",
    )
    .await;
    let _ = git(repo_root, &["branch", "-D", &branch], "branch delete").await;
    let _ = git(repo_root, &["worktree", "prune"], "worktree prune").await;

    match fs::remove_file(worktree_record_path(repo_root, team, worker)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Sidecar records of a team's worktrees, sorted by worker name.
pub fn list_worktree_records(team: &str, repo_root: &Path) -> Result<Vec<WorktreeRecord>, GitError> {
    let dir = repo_root.join(".omc").join("worktrees").join(team);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let bytes = fs::read(&path)?;
        match serde_json::from_slice::<WorktreeRecord>(&bytes) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed worktree record");
            }
        }
    }
    records.sort_by(|a, b| a.worker_name.cmp(&b.worker_name));
    Ok(records)
}

// ── Change snapshots ─────────────────────────────────────────────────────

/// Paths that are changed or untracked in `cwd`: porcelain status union
/// untracked listing, standard ignores excluded.
pub async fn changed_files(cwd: &Path) -> Result<BTreeSet<String>, GitError> {
    let mut files = BTreeSet::new();

    let status = git_ok(cwd, &["status", "--porcelain"], "status").await?;
    for line in status.lines() {
        if line.len() <= 3 {
            continue;
        }
        let path = &line[3..];
        // Renames are reported as "old -> new"; the new path is the change.
        let path = path.rsplit(" -> ").next().unwrap_or(path);
        files.insert(path.trim_matches('"').to_string());
    }

    let untracked = git_ok(
        cwd,
        &["ls-files", "--others", "--exclude-standard"],
        "ls-files",
    )
    .await?;
    for line in untracked.lines() {
        if !line.is_empty() {
            files.insert(line.trim_matches('"').to_string());
        }
    }

    Ok(files)
}

// ── Merging ──────────────────────────────────────────────────────────────

/// Non-destructive conflict probe: files touched on both sides since the
/// merge base. Empty means a clean merge is expected.
pub async fn check_merge_conflicts(
    worker_branch: &str,
    base_branch: &str,
    repo_root: &Path,
) -> Result<Vec<String>, GitError> {
    validate_branch_name(worker_branch)?;
    validate_branch_name(base_branch)?;

    let merge_base = git_ok(
        repo_root,
        &["merge-base", base_branch, worker_branch],
        "merge-base",
    )
    .await?;

    let base_diff = git_ok(
        repo_root,
        &["diff", "--name-only", &format!("{}..{}", merge_base, base_branch)],
        "diff base",
    )
    .await?;
    let worker_diff = git_ok(
        repo_root,
        &["diff", "--name-only", &format!("{}..{}", merge_base, worker_branch)],
        "diff worker",
    )
    .await?;

    let base_files: BTreeSet<&str> = base_diff.lines().filter(|l| !l.is_empty()).collect();
    let conflicts: Vec<String> = worker_diff
        .lines()
        .filter(|l| !l.is_empty() && base_files.contains(l))
        .map(String::from)
        .collect();
    Ok(conflicts)
}

/// Merge a worker branch into the base branch with `--no-ff`.
///
/// Refuses on a dirty tree. On merge failure the merge is aborted
/// (best-effort) and the probe's conflict set is returned.
pub async fn merge_worker_branch(
    worker_branch: &str,
    base_branch: &str,
    repo_root: &Path,
) -> Result<MergeOutcome, GitError> {
    validate_branch_name(worker_branch)?;
    validate_branch_name(base_branch)?;

    let clean = git(
        repo_root,
        &["diff-index", "--quiet", "HEAD"],
        "diff-index",
    )
    .await?;
    if !clean.status.success() {
        return Err(GitError::DirtyWorkTree);
    }

    git_ok(repo_root, &["checkout", base_branch], "checkout").await?;

    let message = format!("Merge {} into {}", worker_branch, base_branch);
    let merge = git(
        repo_root,
        &["merge", "--no-ff", "-m", &message, worker_branch],
        "merge",
    )
    .await?;

    if !merge.status.success() {
        let _ = git(repo_root, &["merge", "--abort"], "merge abort").await;
        let conflicts = check_merge_conflicts(worker_branch, base_branch, repo_root).await?;
        tracing::warn!(branch = worker_branch, ?conflicts, "merge failed, aborted");
        return Ok(MergeOutcome {
            success: false,
            conflicts,
            merge_commit: None,
        });
    }

    let commit = git_ok(repo_root, &["rev-parse", "HEAD"], "rev-parse").await?;
    Ok(MergeOutcome {
        success: true,
        conflicts: Vec::new(),
        merge_commit: Some(commit),
    })
}

/// Merge every worker branch of a team, in worker order, stopping at the
/// first failure so one conflict does not cascade into the rest.
pub async fn merge_all_worker_branches(
    team: &str,
    base_branch: &str,
    repo_root: &Path,
) -> Result<Vec<(String, MergeOutcome)>, GitError> {
    let mut outcomes = Vec::new();
    for record in list_worktree_records(team, repo_root)? {
        let outcome = merge_worker_branch(&record.branch, base_branch, repo_root).await?;
        let failed = !outcome.success;
        outcomes.push((record.worker_name.clone(), outcome));
        if failed {
            break;
        }
    }
    Ok(outcomes)
}

fn write_record(path: &Path, record: &WorktreeRecord) -> Result<(), GitError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut bytes = serde_json::to_vec_pretty(record)?;
    bytes.push(b'\n');
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
