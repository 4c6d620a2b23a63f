// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider CLI runners.
//!
//! Each task execution spawns one provider CLI with the prompt on stdin,
//! no shell wrapping, bounded output buffers, and a wall-clock deadline.
//! The argv and the response extraction are provider-specific; everything
//! else is shared.

mod claude;
mod codex;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCliRunner;

pub use claude::extract_stream_response;

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use omc_core::Provider;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Cap on each of the child's stdout and stderr buffers.
const OUTPUT_CAP_BYTES: usize = 10 * 1024 * 1024;

/// Cap on the extracted response text.
pub const RESPONSE_CAP_BYTES: usize = 1024 * 1024;

/// Marker appended when the response was cut at the cap.
pub const TRUNCATION_MARKER: &str = "\n...[response truncated]";

/// Grace period between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Errors from a CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("cli timed out after {0:?}")]
    Timeout(Duration),
    #[error("cli cancelled before completion")]
    Cancelled,
    #[error("cli spawn failed: {0}")]
    Spawn(String),
    #[error("cli stdin write failed: {0}")]
    Stdin(String),
    #[error("cli exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },
    #[error("cli io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One CLI execution request.
///
/// Cancelling `cancel` while the run is in flight SIGTERMs the child
/// (escalating to SIGKILL after the grace period) and rejects with
/// [`CliError::Cancelled`]; the bridge trips it when a shutdown signal
/// appears mid-execution.
#[derive(Debug, Clone)]
pub struct CliRequest {
    pub provider: Provider,
    pub model: Option<String>,
    pub prompt: String,
    pub cwd: PathBuf,
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

/// Extracted response of a successful execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliResponse {
    pub text: String,
}

/// Executes provider CLIs.
#[async_trait]
pub trait CliRunner: Clone + Send + Sync + 'static {
    async fn run(&self, request: &CliRequest) -> Result<CliResponse, CliError>;
}

/// Spawns the real provider binaries.
#[derive(Clone, Default)]
pub struct ProcessCliRunner;

impl ProcessCliRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CliRunner for ProcessCliRunner {
    async fn run(&self, request: &CliRequest) -> Result<CliResponse, CliError> {
        let (program, args) = match request.provider {
            Provider::Claude => claude::command(request.model.as_deref()),
            Provider::Codex => codex::command(request.model.as_deref()),
        };

        tracing::debug!(
            provider = %request.provider,
            program,
            cwd = %request.cwd.display(),
            "spawning provider cli"
        );

        let captured = run_with_stdin(
            &program,
            &args,
            &request.cwd,
            &request.prompt,
            request.timeout,
            &request.cancel,
        )
        .await?;

        if !captured.success {
            return Err(CliError::NonZeroExit {
                status: captured.status,
                stderr: clip(&String::from_utf8_lossy(&captured.stderr), 2_000),
            });
        }

        let stdout = String::from_utf8_lossy(&captured.stdout);
        let text = match request.provider {
            Provider::Claude => claude::extract_stream_response(&stdout),
            Provider::Codex => codex::extract_response(&stdout),
        };
        Ok(CliResponse { text })
    }
}

#[derive(Debug)]
struct Captured {
    success: bool,
    status: i32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Spawn `program args…`, feed `prompt` on stdin, await completion within
/// `timeout` or until `cancel` trips. Stdout/stderr are buffered to a hard
/// cap but always drained, so a pathological child can neither OOM us nor
/// block on a full pipe.
async fn run_with_stdin(
    program: &str,
    args: &[String],
    cwd: &std::path::Path,
    prompt: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Captured, CliError> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CliError::Spawn(e.to_string()))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| CliError::Spawn("stdin unavailable".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CliError::Spawn("stdout unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| CliError::Spawn("stderr unavailable".to_string()))?;

    let write_prompt = async {
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.shutdown().await?;
        drop(stdin);
        Ok::<(), std::io::Error>(())
    };

    enum Awaited<T> {
        Done(T),
        TimedOut,
        Cancelled,
    }

    // The select block borrows the child; it must end before
    // `terminate_child` can take the child again.
    let awaited = {
        let work = async {
            tokio::join!(
                write_prompt,
                read_capped(stdout, OUTPUT_CAP_BYTES),
                read_capped(stderr, OUTPUT_CAP_BYTES),
                child.wait(),
            )
        };
        tokio::select! {
            results = work => Awaited::Done(results),
            _ = tokio::time::sleep(timeout) => Awaited::TimedOut,
            _ = cancel.cancelled() => Awaited::Cancelled,
        }
    };

    let (stdin_result, stdout_result, stderr_result, status_result) = match awaited {
        Awaited::Done(results) => results,
        Awaited::TimedOut => {
            terminate_child(&mut child).await;
            return Err(CliError::Timeout(timeout));
        }
        Awaited::Cancelled => {
            terminate_child(&mut child).await;
            return Err(CliError::Cancelled);
        }
    };

    if let Err(e) = stdin_result {
        terminate_child(&mut child).await;
        return Err(CliError::Stdin(e.to_string()));
    }

    let status = status_result?;
    Ok(Captured {
        success: status.success(),
        status: status.code().unwrap_or(-1),
        stdout: stdout_result?,
        stderr: stderr_result?,
    })
}

/// SIGTERM, wait up to the grace period, then SIGKILL.
async fn terminate_child(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        let _ = child.kill().await;
    }
}

/// Read everything, keeping at most `cap` bytes.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> std::io::Result<Vec<u8>> {
    let mut collected = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if collected.len() < cap {
            let take = (cap - collected.len()).min(n);
            collected.extend_from_slice(&buf[..take]);
        }
    }
    Ok(collected)
}

/// Truncate to at most `cap` bytes on a char boundary.
pub(crate) fn clip(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let mut end = cap;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Apply the response cap, appending the truncation marker when cut.
pub(crate) fn cap_response(text: String) -> String {
    if text.len() <= RESPONSE_CAP_BYTES {
        return text;
    }
    let mut clipped = clip(&text, RESPONSE_CAP_BYTES);
    clipped.push_str(TRUNCATION_MARKER);
    clipped
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
