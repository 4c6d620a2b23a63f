// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task usage records and per-worker aggregation.
//!
//! Only wall-clock and byte counts are tracked; nothing here attempts
//! token accounting.

use crate::fsio::{self, FsError, FILE_MODE};
use crate::paths::TeamPaths;
use omc_core::Provider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Errors from usage log operations.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialize error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One completed (or failed) task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub task_id: String,
    pub worker_name: String,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub started_at: String,
    pub completed_at: String,
    pub wall_clock_ms: u64,
    pub prompt_chars: u64,
    pub response_chars: u64,
}

/// Aggregated usage for one worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerUsage {
    pub worker_name: String,
    pub tasks: u64,
    pub wall_clock_ms: u64,
    pub prompt_chars: u64,
    pub response_chars: u64,
}

/// Usage log accessor for one project tree.
#[derive(Clone)]
pub struct UsageLog {
    paths: TeamPaths,
}

impl UsageLog {
    pub fn new(paths: TeamPaths) -> Self {
        Self { paths }
    }

    /// Append one usage record.
    pub fn record(&self, team: &str, record: &UsageRecord) -> Result<(), UsageError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        fsio::append_file_with_mode(
            &self.paths.usage_log_path(team),
            self.paths.project_root(),
            &line,
            FILE_MODE,
        )?;
        Ok(())
    }

    /// All parseable usage records of a team, in append order.
    pub fn read_all(&self, team: &str) -> Result<Vec<UsageRecord>, UsageError> {
        let path = self.paths.usage_log_path(team);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Ok(record) = serde_json::from_str::<UsageRecord>(line.trim()) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Per-worker sums over the whole log, sorted by worker name.
    pub fn generate_report(&self, team: &str) -> Result<Vec<WorkerUsage>, UsageError> {
        let mut by_worker: BTreeMap<String, WorkerUsage> = BTreeMap::new();
        for record in self.read_all(team)? {
            let entry = by_worker
                .entry(record.worker_name.clone())
                .or_insert_with(|| WorkerUsage {
                    worker_name: record.worker_name.clone(),
                    ..WorkerUsage::default()
                });
            entry.tasks += 1;
            entry.wall_clock_ms += record.wall_clock_ms;
            entry.prompt_chars += record.prompt_chars;
            entry.response_chars += record.response_chars;
        }
        Ok(by_worker.into_values().collect())
    }
}

/// Byte sizes of the prompt and output files; 0 when a file is missing.
pub fn measure_char_counts(prompt_path: &Path, output_path: &Path) -> (u64, u64) {
    let size_of = |path: &Path| fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    (size_of(prompt_path), size_of(output_path))
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
