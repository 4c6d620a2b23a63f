// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted per-worker restart counters.

use crate::fsio::{self, FsError, FILE_MODE};
use crate::paths::TeamPaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use thiserror::Error;

/// Errors from restart state persistence.
#[derive(Debug, Error)]
pub enum RestartStoreError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Restart bookkeeping for one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartState {
    pub worker_name: String,
    pub restart_count: u32,
    pub last_restart_at: String,
    pub next_backoff_ms: u64,
}

/// Restart state accessor for one project tree.
#[derive(Clone)]
pub struct RestartStore {
    paths: TeamPaths,
}

impl RestartStore {
    pub fn new(paths: TeamPaths) -> Self {
        Self { paths }
    }

    pub fn read(&self, team: &str, worker: &str) -> Result<Option<RestartState>, RestartStoreError> {
        Ok(fsio::read_json_lenient(
            &self.paths.restart_state_path(team, worker),
        )?)
    }

    pub fn write(&self, team: &str, state: &RestartState) -> Result<(), RestartStoreError> {
        fsio::atomic_write_json(
            &self.paths.restart_state_path(team, &state.worker_name),
            self.paths.project_root(),
            state,
            FILE_MODE,
        )?;
        Ok(())
    }

    /// Remove the sidecar after a clean run.
    pub fn clear(&self, team: &str, worker: &str) -> Result<(), RestartStoreError> {
        match fs::remove_file(self.paths.restart_state_path(team, worker)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "restart_store_tests.rs"]
mod tests;
