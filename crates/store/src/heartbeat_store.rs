// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker heartbeat records.

use crate::fsio::{self, FsError, FILE_MODE};
use crate::paths::TeamPaths;
use chrono::{DateTime, Utc};
use omc_core::{parse_iso, Heartbeat};
use std::fs;
use std::io;
use thiserror::Error;

/// Errors from heartbeat store operations.
#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Heartbeat file accessor for one project tree.
#[derive(Clone)]
pub struct HeartbeatStore {
    paths: TeamPaths,
}

impl HeartbeatStore {
    pub fn new(paths: TeamPaths) -> Self {
        Self { paths }
    }

    /// Atomically rewrite a worker's heartbeat.
    pub fn write(&self, heartbeat: &Heartbeat) -> Result<(), HeartbeatError> {
        let path = self
            .paths
            .heartbeat_path(&heartbeat.team_name, &heartbeat.worker_name);
        fsio::atomic_write_json(&path, self.paths.project_root(), heartbeat, FILE_MODE)?;
        Ok(())
    }

    /// Read a worker's heartbeat; `None` when missing or malformed.
    pub fn read(&self, team: &str, worker: &str) -> Result<Option<Heartbeat>, HeartbeatError> {
        Ok(fsio::read_json_lenient(
            &self.paths.heartbeat_path(team, worker),
        )?)
    }

    /// All parseable heartbeats of a team.
    pub fn list(&self, team: &str) -> Result<Vec<Heartbeat>, HeartbeatError> {
        let dir = self.paths.bridge_state_dir(team);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut heartbeats = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".heartbeat.json") {
                continue;
            }
            if let Some(hb) = fsio::read_json_lenient::<Heartbeat>(&path)? {
                heartbeats.push(hb);
            }
        }
        heartbeats.sort_by(|a, b| a.worker_name.cmp(&b.worker_name));
        Ok(heartbeats)
    }

    /// A worker is alive iff its heartbeat exists and is younger than
    /// `max_age_ms`. Missing or unparseable timestamps count as dead.
    pub fn is_worker_alive(
        &self,
        team: &str,
        worker: &str,
        max_age_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, HeartbeatError> {
        let Some(heartbeat) = self.read(team, worker)? else {
            return Ok(false);
        };
        Ok(heartbeat_is_fresh(&heartbeat, max_age_ms, now))
    }

    pub fn delete(&self, team: &str, worker: &str) -> Result<(), HeartbeatError> {
        let path = self.paths.heartbeat_path(team, worker);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every heartbeat file of a team. Returns the removed count.
    pub fn cleanup_team(&self, team: &str) -> Result<usize, HeartbeatError> {
        let mut removed = 0;
        for heartbeat in self.list(team)? {
            self.delete(team, &heartbeat.worker_name)?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Freshness check shared with the unified view's status projection.
pub fn heartbeat_is_fresh(heartbeat: &Heartbeat, max_age_ms: u64, now: DateTime<Utc>) -> bool {
    let Some(last) = parse_iso(&heartbeat.last_poll_at) else {
        return false;
    };
    let age_ms = now.signed_duration_since(last).num_milliseconds();
    age_ms >= 0 && (age_ms as u64) < max_age_ms
}

#[cfg(test)]
#[path = "heartbeat_store_tests.rs"]
mod tests;
