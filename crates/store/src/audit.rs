// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL audit log per team.
//!
//! Appends never propagate errors: a worker must not crash because its
//! audit trail is unwritable. Reads stream with inline filters; rotation
//! keeps the most recent half of the lines.

use crate::fsio::{self, FsError, FILE_MODE};
use crate::paths::TeamPaths;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::fs::OpenOptionsExt;
use thiserror::Error;

/// Default rotation threshold.
pub const AUDIT_MAX_SIZE: u64 = 5 * 1024 * 1024;

/// Errors from audit log reads and rotation.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Closed set of audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    BridgeStart,
    BridgeShutdown,
    TaskClaimed,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskPermanentlyFailed,
    WorkerQuarantined,
    WorkerIdle,
    InboxRotated,
    OutboxRotated,
    CliSpawned,
    CliTimeout,
    CliError,
    ShutdownReceived,
    ShutdownAck,
    PermissionViolation,
    PermissionAudit,
}

/// One audit log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub timestamp: String,
    pub event_type: AuditKind,
    pub team_name: String,
    pub worker_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditKind,
        team: &str,
        worker: &str,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            event_type,
            team_name: team.to_string(),
            worker_name: worker.to_string(),
            task_id: None,
            details: None,
        }
    }

    pub fn with_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }
}

/// Filters for a streaming audit read.
#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub event_type: Option<AuditKind>,
    pub worker_name: Option<String>,
    /// ISO timestamp; events strictly older are skipped.
    pub since: Option<String>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn accepts(&self, event: &AuditEvent) -> bool {
        if self.event_type.is_some_and(|k| k != event.event_type) {
            return false;
        }
        if self
            .worker_name
            .as_deref()
            .is_some_and(|w| w != event.worker_name)
        {
            return false;
        }
        if self
            .since
            .as_deref()
            .is_some_and(|s| event.timestamp.as_str() < s)
        {
            return false;
        }
        true
    }
}

/// Audit log accessor for one project tree.
#[derive(Clone)]
pub struct AuditLog {
    paths: TeamPaths,
}

impl AuditLog {
    pub fn new(paths: TeamPaths) -> Self {
        Self { paths }
    }

    /// Append an event. Failures are logged, never propagated.
    pub fn append(&self, event: &AuditEvent) {
        let path = self.paths.audit_log_path(&event.team_name);
        let result = (|| -> Result<(), AuditError> {
            let mut line = serde_json::to_vec(event).map_err(|e| FsError::Json {
                path: path.clone(),
                source: e,
            })?;
            line.push(b'\n');
            fsio::append_file_with_mode(&path, self.paths.project_root(), &line, FILE_MODE)?;
            Ok(())
        })();
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "audit append failed");
        }
    }

    /// Stream the log with inline filters; malformed lines are skipped
    /// silently; stops once `limit` events are accepted.
    pub fn read(&self, team: &str, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let path = self.paths.audit_log_path(team);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(event) = serde_json::from_str::<AuditEvent>(trimmed) else {
                continue;
            };
            if !filter.accepts(&event) {
                continue;
            }
            events.push(event);
            if filter.limit.is_some_and(|limit| events.len() >= limit) {
                break;
            }
        }
        Ok(events)
    }

    /// Keep the most recent half of the lines once the file exceeds
    /// `max_size` bytes. The temp file is created fresh (`O_EXCL`) so a
    /// planted symlink at the temp path cannot redirect the write.
    pub fn rotate_if_needed(&self, team: &str, max_size: u64) -> Result<bool, AuditError> {
        let path = self.paths.audit_log_path(team);
        let size = match fs::metadata(&path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if size <= max_size {
            return Ok(false);
        }

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().filter(|l| !l.is_empty()).collect();
        let keep = lines.len() / 2;
        let tail = &lines[lines.len() - keep..];

        let mut tmp_name = path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp_name);
        let _ = fs::remove_file(&tmp);

        let result = (|| -> Result<(), AuditError> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(FILE_MODE)
                .open(&tmp)?;
            for line in tail {
                writeln!(file, "{}", line)?;
            }
            fs::rename(&tmp, &path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result.map(|()| true)
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
