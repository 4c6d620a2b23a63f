// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-multiplexer session host.
//!
//! Workers run inside named detached sessions, one per `(team, worker)`.
//! Arguments always travel as argv; nothing is ever interpolated into a
//! shell string.

mod tmux;

pub use tmux::TmuxSessionHost;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSessionHost, SessionCall};

use async_trait::async_trait;
use omc_core::session_name;
use std::path::Path;
use thiserror::Error;

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Host of named detached terminal sessions.
#[async_trait]
pub trait SessionHost: Clone + Send + Sync + 'static {
    /// Create a detached session running `argv` in `cwd`.
    ///
    /// Any existing session under the same name is killed first.
    async fn create(&self, name: &str, cwd: &Path, argv: &[String]) -> Result<(), SessionError>;

    /// Kill a session. Absence and an explicit "no such session" answer
    /// are equivalent: both succeed.
    async fn kill(&self, name: &str) -> Result<(), SessionError>;

    /// Whether a session with this name exists.
    async fn is_alive(&self, name: &str) -> Result<bool, SessionError>;

    /// Names of all live bridge sessions (the `omc-` prefix).
    async fn list_active(&self) -> Result<Vec<String>, SessionError>;
}

/// Spawn a worker's bridge daemon inside its named session.
///
/// The daemon is handed its config file path via `--config`; the session
/// name is the canonical `omc-{team}-{worker}`.
pub async fn spawn_bridge_in_session<S: SessionHost>(
    host: &S,
    team: &str,
    worker: &str,
    cwd: &Path,
    bridge_bin: &str,
    config_path: &Path,
) -> Result<String, SessionError> {
    let name = session_name(team, worker);
    let argv = vec![
        bridge_bin.to_string(),
        "--config".to_string(),
        config_path.display().to_string(),
    ];
    host.create(&name, cwd, &argv).await?;
    Ok(name)
}

/// Kill a worker's session by its canonical name.
pub async fn kill_worker_session<S: SessionHost>(
    host: &S,
    team: &str,
    worker: &str,
) -> Result<(), SessionError> {
    host.kill(&session_name(team, worker)).await
}

/// Whether a worker's session is alive.
pub async fn is_worker_session_alive<S: SessionHost>(
    host: &S,
    team: &str,
    worker: &str,
) -> Result<bool, SessionError> {
    host.is_alive(&session_name(team, worker)).await
}
