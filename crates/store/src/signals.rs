// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown and drain signal files.
//!
//! Presence of the file is the signal; the bridge consumes it and deletes
//! the file. Level-triggered: re-creating the file re-signals.

use crate::fsio::{self, FsError, FILE_MODE};
use crate::paths::TeamPaths;
use omc_core::SignalPayload;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors from signal file operations.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Which signal file to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalKind {
    Shutdown,
    Drain,
}

/// Signal file accessor for one team tree.
#[derive(Clone)]
pub struct Signals {
    paths: TeamPaths,
}

impl Signals {
    pub fn new(paths: TeamPaths) -> Self {
        Self { paths }
    }

    pub fn write_shutdown(
        &self,
        team: &str,
        worker: &str,
        payload: &SignalPayload,
    ) -> Result<(), SignalError> {
        self.write(SignalKind::Shutdown, team, worker, payload)
    }

    pub fn write_drain(
        &self,
        team: &str,
        worker: &str,
        payload: &SignalPayload,
    ) -> Result<(), SignalError> {
        self.write(SignalKind::Drain, team, worker, payload)
    }

    /// Lead-side convenience: write a shutdown signal with a fresh
    /// request id. Returns the payload so the caller can match the ack.
    pub fn request_shutdown(
        &self,
        team: &str,
        worker: &str,
        reason: &str,
        timestamp: String,
    ) -> Result<SignalPayload, SignalError> {
        let payload = SignalPayload {
            request_id: uuid::Uuid::new_v4().to_string(),
            reason: reason.to_string(),
            timestamp,
        };
        self.write_shutdown(team, worker, &payload)?;
        Ok(payload)
    }

    /// Like [`Signals::request_shutdown`], for the drain flag.
    pub fn request_drain(
        &self,
        team: &str,
        worker: &str,
        reason: &str,
        timestamp: String,
    ) -> Result<SignalPayload, SignalError> {
        let payload = SignalPayload {
            request_id: uuid::Uuid::new_v4().to_string(),
            reason: reason.to_string(),
            timestamp,
        };
        self.write_drain(team, worker, &payload)?;
        Ok(payload)
    }

    /// Read the shutdown signal; `None` when absent. A present file with a
    /// malformed payload still signals.
    pub fn check_shutdown(
        &self,
        team: &str,
        worker: &str,
    ) -> Result<Option<SignalPayload>, SignalError> {
        self.check(&self.paths.shutdown_signal_path(team, worker))
    }

    pub fn check_drain(
        &self,
        team: &str,
        worker: &str,
    ) -> Result<Option<SignalPayload>, SignalError> {
        self.check(&self.paths.drain_signal_path(team, worker))
    }

    pub fn clear_shutdown(&self, team: &str, worker: &str) -> Result<(), SignalError> {
        remove_if_exists(&self.paths.shutdown_signal_path(team, worker))
    }

    pub fn clear_drain(&self, team: &str, worker: &str) -> Result<(), SignalError> {
        remove_if_exists(&self.paths.drain_signal_path(team, worker))
    }

    fn write(
        &self,
        kind: SignalKind,
        team: &str,
        worker: &str,
        payload: &SignalPayload,
    ) -> Result<(), SignalError> {
        let path = match kind {
            SignalKind::Shutdown => self.paths.shutdown_signal_path(team, worker),
            SignalKind::Drain => self.paths.drain_signal_path(team, worker),
        };
        fsio::atomic_write_json(&path, self.paths.user_root(), payload, FILE_MODE)?;
        Ok(())
    }

    fn check(&self, path: &Path) -> Result<Option<SignalPayload>, SignalError> {
        if !path.exists() {
            return Ok(None);
        }
        match fsio::read_json_lenient::<SignalPayload>(path)? {
            Some(payload) => Ok(Some(payload)),
            // Presence is the signal even when the payload is unreadable.
            None => Ok(Some(SignalPayload {
                request_id: String::new(),
                reason: String::new(),
                timestamp: String::new(),
            })),
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<(), SignalError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
