// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux session host

use super::{SessionError, SessionHost};
use crate::subprocess::{run_command, TMUX_TIMEOUT};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;

/// Tmux-backed session host
#[derive(Clone, Default)]
pub struct TmuxSessionHost;

impl TmuxSessionHost {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, args: &[&str], description: &str) -> Result<std::process::Output, SessionError> {
        run_command("tmux", args, TMUX_TIMEOUT, description)
            .await
            .map_err(|e| SessionError::CommandFailed(e.to_string()))
    }
}

#[async_trait]
impl SessionHost for TmuxSessionHost {
    async fn create(&self, name: &str, cwd: &Path, argv: &[String]) -> Result<(), SessionError> {
        // Precondition: cwd must exist
        if !cwd.exists() {
            return Err(SessionError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        // Replace any stale session of the same name.
        if self.is_alive(name).await? {
            tracing::warn!(session = name, "session already exists, killing first");
            self.kill(name).await?;
        }

        let mut args: Vec<OsString> = vec![
            "new-session".into(),
            "-d".into(),
            "-s".into(),
            name.into(),
            "-c".into(),
            cwd.as_os_str().to_os_string(),
            "--".into(),
        ];
        for arg in argv {
            args.push(arg.into());
        }

        let output = run_command("tmux", args, TMUX_TIMEOUT, "tmux new-session")
            .await
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(session = name, stderr = %stderr, "tmux spawn failed");
            return Err(SessionError::SpawnFailed(stderr.to_string()));
        }

        // Log stderr even on success - may contain useful warnings
        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(session = name, stderr = %stderr, "tmux spawn stderr (non-fatal)");
        }

        Ok(())
    }

    async fn kill(&self, name: &str) -> Result<(), SessionError> {
        let output = self
            .run(&["kill-session", "-t", name], "tmux kill-session")
            .await?;

        if output.status.success() {
            return Ok(());
        }
        // A session that is already gone is the state we wanted.
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no such session") || stderr.contains("can't find session") {
            return Ok(());
        }
        Err(SessionError::CommandFailed(stderr.to_string()))
    }

    async fn is_alive(&self, name: &str) -> Result<bool, SessionError> {
        let output = self
            .run(&["has-session", "-t", name], "tmux has-session")
            .await?;
        Ok(output.status.success())
    }

    async fn list_active(&self) -> Result<Vec<String>, SessionError> {
        let output = self
            .run(
                &["list-sessions", "-F", "#{session_name}"],
                "tmux list-sessions",
            )
            .await?;

        // tmux exits non-zero when no server is running: no sessions.
        if !output.status.success() {
            return Ok(Vec::new());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|name| name.starts_with("omc-"))
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
