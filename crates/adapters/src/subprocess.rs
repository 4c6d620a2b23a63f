// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded external command execution.
//!
//! The session host and the git coordinator shell out through this one
//! helper: argv in, `Output` back, a hard deadline on every call. Nothing
//! here ever builds a shell string.

use std::ffi::OsStr;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Deadline for tmux session control commands.
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for git worktree and merge operations.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from a bounded command run.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{context} failed: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context} timed out after {}s", timeout.as_secs())]
    TimedOut { context: String, timeout: Duration },
}

/// Run `program` with `args`, collecting its output within `timeout`.
///
/// A non-zero exit is not an error here; callers inspect the status. A
/// child still running at the deadline is killed when its tokio handle
/// drops, so nothing leaks past the timeout.
pub async fn run_command<I, S>(
    program: &str,
    args: I,
    timeout: Duration,
    context: &str,
) -> Result<Output, ExecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ExecError::Io {
            context: context.to_string(),
            source,
        }),
        Err(_elapsed) => Err(ExecError::TimedOut {
            context: context.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
