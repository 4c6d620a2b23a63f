// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-team task records with atomic exclusive-claim locks.
//!
//! A claim is an `O_CREAT|O_EXCL` lock file next to the task record; the
//! kernel guarantees at most one creator succeeds. Stale locks (old enough
//! and owned by a dead pid) are reaped once and the create retried.

use crate::fsio::{self, FsError, FILE_MODE};
use crate::paths::TeamPaths;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use omc_core::{validate_task_id, Clock, NameError, SystemClock, Task, TaskFailure, TaskStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Age beyond which a lock owned by a dead pid is considered stale.
pub const STALE_LOCK_MS: u64 = 30_000;

/// Errors from task store operations.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Payload written into a claim lock file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockPayload {
    pid: u32,
    worker_name: String,
    timestamp: u64,
}

/// Held claim lock; released explicitly, unlinked on drop as a backstop.
struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    fn release(mut self) {
        self.released = true;
        let _ = fs::remove_file(&self.path);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Is the given pid alive? `EPERM` means it exists but belongs to someone
/// else, which still counts as alive.
fn pid_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Numeric-preferring task id order: numeric comparison when both ids
/// parse as integers, lexicographic otherwise.
fn task_id_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Store of task records for all teams under one user root.
#[derive(Clone)]
pub struct TaskStore<C: Clock = SystemClock> {
    paths: TeamPaths,
    clock: C,
    stale_lock_ms: u64,
}

impl TaskStore<SystemClock> {
    pub fn new(paths: TeamPaths) -> Self {
        Self::with_clock(paths, SystemClock)
    }
}

impl<C: Clock> TaskStore<C> {
    pub fn with_clock(paths: TeamPaths, clock: C) -> Self {
        Self {
            paths,
            clock,
            stale_lock_ms: STALE_LOCK_MS,
        }
    }

    /// Override the stale-lock window (tests).
    pub fn with_stale_lock_ms(mut self, ms: u64) -> Self {
        self.stale_lock_ms = ms;
        self
    }

    /// Read a task record; `None` when missing or malformed.
    pub fn read_task(&self, team: &str, id: &str) -> Result<Option<Task>, TaskStoreError> {
        Ok(fsio::read_json_lenient(&self.paths.task_path(team, id))?)
    }

    /// Atomically write a task record. The id is validated here, the one
    /// choke point before it is embedded in file names.
    pub fn write_task(&self, team: &str, task: &Task) -> Result<(), TaskStoreError> {
        validate_task_id(&task.id)?;
        fsio::atomic_write_json(
            &self.paths.task_path(team, &task.id),
            self.paths.user_root(),
            task,
            FILE_MODE,
        )?;
        Ok(())
    }

    /// Read-modify-write a task, preserving unknown fields.
    ///
    /// Runs under the claim lock by default. When the lock cannot be
    /// acquired the update proceeds unlocked with a warning, a documented
    /// degradation kept for compatibility with foreign writers.
    pub fn update_task(
        &self,
        team: &str,
        id: &str,
        patch: impl FnOnce(&mut Task),
        use_lock: bool,
    ) -> Result<Task, TaskStoreError> {
        let guard = if use_lock {
            let guard = self.acquire_task_lock(team, id, "update")?;
            if guard.is_none() {
                tracing::warn!(team, task = id, "task lock unavailable, updating unlocked");
            }
            guard
        } else {
            None
        };

        let result = (|| {
            let mut task = self
                .read_task(team, id)?
                .ok_or_else(|| TaskStoreError::TaskNotFound(id.to_string()))?;
            patch(&mut task);
            self.write_task(team, &task)?;
            Ok(task)
        })();

        if let Some(guard) = guard {
            guard.release();
        }
        result
    }

    /// All task ids for a team, in numeric-preferring order.
    pub fn list_task_ids(&self, team: &str) -> Result<Vec<String>, TaskStoreError> {
        let dir = self.paths.tasks_dir(team);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(".json") {
                if !id.ends_with(".failure") {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort_by(|a, b| task_id_order(a, b));
        Ok(ids)
    }

    /// Whether every blocker of `task` is completed.
    pub fn are_blockers_resolved(&self, team: &str, task: &Task) -> Result<bool, TaskStoreError> {
        for blocker in &task.blocked_by {
            match self.read_task(team, blocker)? {
                Some(dep) if dep.status == TaskStatus::Completed => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Scan for the next claimable task and take the exclusive claim.
    ///
    /// Returns the mutated record (`in_progress`, claim marker set) on
    /// success, `None` when no task is currently claimable by `worker`.
    pub fn find_next_task(
        &self,
        team: &str,
        worker: &str,
    ) -> Result<Option<Task>, TaskStoreError> {
        for id in self.list_task_ids(team)? {
            let Some(task) = self.read_task(team, &id)? else {
                continue;
            };
            if !task.is_claimable_by(worker) || !self.are_blockers_resolved(team, &task)? {
                continue;
            }

            let Some(guard) = self.acquire_task_lock(team, &id, worker)? else {
                // Rival worker holds the lock; try the next candidate.
                continue;
            };

            let claimed = (|| -> Result<Option<Task>, TaskStoreError> {
                // Re-verify eligibility under the lock: the task may have
                // been claimed and rewritten between scan and lock.
                let Some(mut task) = self.read_task(team, &id)? else {
                    return Ok(None);
                };
                if !task.is_claimable_by(worker) || !self.are_blockers_resolved(team, &task)? {
                    return Ok(None);
                }
                task.status = TaskStatus::InProgress;
                task.claimed_by = Some(worker.to_string());
                task.claimed_at = Some(self.clock.epoch_ms());
                task.claim_pid = Some(std::process::id());
                self.write_task(team, &task)?;
                Ok(Some(task))
            })();

            guard.release();

            match claimed {
                Ok(Some(task)) => return Ok(Some(task)),
                Ok(None) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Run `f` while holding the task's claim lock.
    ///
    /// Returns `None` without calling `f` when the lock is unavailable.
    /// The lock is released on both success and error.
    pub fn with_task_lock<T>(
        &self,
        team: &str,
        id: &str,
        worker: &str,
        f: impl FnOnce() -> Result<T, TaskStoreError>,
    ) -> Result<Option<T>, TaskStoreError> {
        let Some(guard) = self.acquire_task_lock(team, id, worker)? else {
            return Ok(None);
        };
        let result = f();
        guard.release();
        result.map(Some)
    }

    fn acquire_task_lock(
        &self,
        team: &str,
        id: &str,
        worker: &str,
    ) -> Result<Option<LockGuard>, TaskStoreError> {
        let path = self.paths.task_lock_path(team, id);
        fsio::validate_resolved_path(&path, self.paths.user_root())?;
        if let Some(parent) = path.parent() {
            fsio::ensure_dir_with_mode(parent, crate::fsio::DIR_MODE)?;
        }

        match self.try_create_lock(&path, worker) {
            Ok(guard) => return Ok(Some(guard)),
            Err(e) if e.kind() != io::ErrorKind::AlreadyExists => return Err(e.into()),
            Err(_) => {}
        }

        if !self.lock_is_stale(&path) {
            return Ok(None);
        }

        tracing::warn!(team, task = id, "reaping stale task lock");
        let _ = fs::remove_file(&path);
        match self.try_create_lock(&path, worker) {
            Ok(guard) => Ok(Some(guard)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn try_create_lock(&self, path: &Path, worker: &str) -> Result<LockGuard, io::Error> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(FILE_MODE)
            .open(path)?;
        let payload = LockPayload {
            pid: std::process::id(),
            worker_name: worker.to_string(),
            timestamp: self.clock.epoch_ms(),
        };
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        file.write_all(&bytes)?;
        Ok(LockGuard {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// A lock is stale when it is older than the stale window and its
    /// owner pid is no longer alive. A malformed payload falls back to the
    /// file mtime for the age check and skips the pid check.
    fn lock_is_stale(&self, path: &Path) -> bool {
        let now_ms = self.clock.epoch_ms();

        if let Ok(Some(payload)) = fsio::read_json::<LockPayload>(path) {
            let age = now_ms.saturating_sub(payload.timestamp);
            return age > self.stale_lock_ms && !pid_alive(payload.pid);
        }

        // Malformed payload: old enough by mtime is stale.
        let Ok(meta) = fs::metadata(path) else {
            // Vanished between check and read: the rival released it.
            return false;
        };
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(now_ms);
        now_ms.saturating_sub(mtime_ms) > self.stale_lock_ms
    }

    // ── Failure sidecar ──────────────────────────────────────────────────

    /// Create or increment the failure sidecar for a task.
    pub fn write_task_failure(
        &self,
        team: &str,
        id: &str,
        error: &str,
    ) -> Result<TaskFailure, TaskStoreError> {
        let path = self.paths.task_failure_path(team, id);
        let retry_count = fsio::read_json_lenient::<TaskFailure>(&path)?
            .map(|f| f.retry_count)
            .unwrap_or(0)
            + 1;
        let failure = TaskFailure {
            task_id: id.to_string(),
            last_error: error.to_string(),
            retry_count,
            last_failed_at: self.clock.iso_now(),
        };
        fsio::atomic_write_json(&path, self.paths.user_root(), &failure, FILE_MODE)?;
        Ok(failure)
    }

    pub fn read_task_failure(
        &self,
        team: &str,
        id: &str,
    ) -> Result<Option<TaskFailure>, TaskStoreError> {
        Ok(fsio::read_json_lenient(
            &self.paths.task_failure_path(team, id),
        )?)
    }

    /// Whether the task has used up its retries.
    pub fn is_task_retry_exhausted(
        &self,
        team: &str,
        id: &str,
        max_retries: u32,
    ) -> Result<bool, TaskStoreError> {
        Ok(self
            .read_task_failure(team, id)?
            .is_some_and(|f| f.retry_count >= max_retries))
    }
}

#[cfg(test)]
#[path = "task_store_tests.rs"]
mod tests;
