// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker inbox/outbox JSONL channels with byte-offset cursors.
//!
//! Writes append one newline-terminated JSON line. Reads advance a
//! persisted byte cursor, never a line count, so a partial final line is
//! left for the next read and a malformed line is never silently skipped.

use crate::fsio::{self, FsError, FILE_MODE};
use crate::paths::TeamPaths;
use omc_core::{InboxMessage, OutboxMessage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

/// Upper bound on a single cursored read.
const READ_CAP_BYTES: u64 = 10 * 1024 * 1024;

/// Inbox rotation threshold.
pub const INBOX_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Errors from mailbox operations.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialize error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted reader position for one side of a channel.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cursor {
    bytes_read: u64,
}

/// Result of one cursored read: parsed records plus consumed byte count.
struct ReadOutcome<T> {
    records: Vec<T>,
    new_cursor: u64,
}

/// The per-worker JSONL channels of one team tree.
#[derive(Clone)]
pub struct Mailbox {
    paths: TeamPaths,
}

impl Mailbox {
    pub fn new(paths: TeamPaths) -> Self {
        Self { paths }
    }

    // ── Appends ──────────────────────────────────────────────────────────

    pub fn append_inbox(
        &self,
        team: &str,
        worker: &str,
        message: &InboxMessage,
    ) -> Result<(), MailboxError> {
        self.append_line(&self.paths.inbox_path(team, worker), message)
    }

    pub fn append_outbox(
        &self,
        team: &str,
        worker: &str,
        message: &OutboxMessage,
    ) -> Result<(), MailboxError> {
        self.append_line(&self.paths.outbox_path(team, worker), message)
    }

    fn append_line<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), MailboxError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        fsio::append_file_with_mode(path, self.paths.user_root(), &line, FILE_MODE)?;
        Ok(())
    }

    // ── Cursored reads ───────────────────────────────────────────────────

    /// New inbox messages since the worker's cursor.
    pub fn read_new_inbox(
        &self,
        team: &str,
        worker: &str,
    ) -> Result<Vec<InboxMessage>, MailboxError> {
        self.read_new(
            &self.paths.inbox_path(team, worker),
            &self.paths.inbox_cursor_path(team, worker),
        )
    }

    /// New outbox messages since the lead's cursor.
    pub fn read_new_outbox(
        &self,
        team: &str,
        worker: &str,
    ) -> Result<Vec<OutboxMessage>, MailboxError> {
        self.read_new(
            &self.paths.outbox_path(team, worker),
            &self.paths.outbox_cursor_path(team, worker),
        )
    }

    /// Every inbox message, ignoring the cursor. Diagnostics only.
    pub fn read_all_inbox(
        &self,
        team: &str,
        worker: &str,
    ) -> Result<Vec<InboxMessage>, MailboxError> {
        let path = self.paths.inbox_path(team, worker);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let outcome = parse_complete_lines(&bytes);
        Ok(outcome.records)
    }

    /// Truncate the inbox and reset its cursor.
    ///
    /// The two writes are separate; if only the truncate lands, the stale
    /// cursor resets itself on the next read.
    pub fn clear_inbox(&self, team: &str, worker: &str) -> Result<(), MailboxError> {
        let path = self.paths.inbox_path(team, worker);
        fsio::write_file_with_mode(&path, self.paths.user_root(), b"", FILE_MODE)?;
        self.save_cursor(&self.paths.inbox_cursor_path(team, worker), 0)
    }

    fn read_new<T: DeserializeOwned>(
        &self,
        path: &Path,
        cursor_path: &Path,
    ) -> Result<Vec<T>, MailboxError> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata()?.len();

        let mut cursor = self.load_cursor(cursor_path)?;
        if size < cursor {
            // File was truncated or rotated behind our back: reread from head.
            cursor = 0;
        }

        let to_read = (size - cursor).min(READ_CAP_BYTES);
        if to_read == 0 {
            self.save_cursor(cursor_path, cursor)?;
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(cursor))?;
        let mut buf = vec![0u8; to_read as usize];
        file.read_exact(&mut buf)?;

        let outcome = parse_complete_lines(&buf);
        self.save_cursor(cursor_path, cursor + outcome.new_cursor)?;
        Ok(outcome.records)
    }

    fn load_cursor(&self, cursor_path: &Path) -> Result<u64, MailboxError> {
        Ok(fsio::read_json_lenient::<Cursor>(cursor_path)?
            .map(|c| c.bytes_read)
            .unwrap_or(0))
    }

    fn save_cursor(&self, cursor_path: &Path, bytes_read: u64) -> Result<(), MailboxError> {
        fsio::atomic_write_json(
            cursor_path,
            self.paths.user_root(),
            &Cursor { bytes_read },
            FILE_MODE,
        )?;
        Ok(())
    }

    // ── Rotation ─────────────────────────────────────────────────────────

    /// Keep the newest `max_lines / 2` outbox lines when over `max_lines`.
    pub fn rotate_outbox_if_needed(
        &self,
        team: &str,
        worker: &str,
        max_lines: usize,
    ) -> Result<bool, MailboxError> {
        let path = self.paths.outbox_path(team, worker);
        let Some(lines) = read_lines_if_exists(&path)? else {
            return Ok(false);
        };
        if lines.len() <= max_lines {
            return Ok(false);
        }

        let keep = max_lines / 2;
        let tail = rejoin_lines(&lines[lines.len() - keep..]);
        fsio::atomic_write_bytes(&path, self.paths.user_root(), &tail, FILE_MODE)?;
        Ok(true)
    }

    /// Keep the newest inbox lines fitting in `max_bytes / 2` when the file
    /// exceeds `max_bytes`; resets the worker's cursor, since recorded
    /// offsets no longer correspond to the file content.
    pub fn rotate_inbox_if_needed(
        &self,
        team: &str,
        worker: &str,
        max_bytes: u64,
    ) -> Result<bool, MailboxError> {
        let path = self.paths.inbox_path(team, worker);
        let size = match fs::metadata(&path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if size <= max_bytes {
            return Ok(false);
        }

        let Some(lines) = read_lines_if_exists(&path)? else {
            return Ok(false);
        };
        let budget = max_bytes / 2;
        let mut total: u64 = 0;
        let mut start = lines.len();
        for (i, line) in lines.iter().enumerate().rev() {
            let cost = line.len() as u64 + 1;
            if total + cost > budget {
                break;
            }
            total += cost;
            start = i;
        }

        let tail = rejoin_lines(&lines[start..]);
        fsio::atomic_write_bytes(&path, self.paths.user_root(), &tail, FILE_MODE)?;
        self.save_cursor(&self.paths.inbox_cursor_path(team, worker), 0)?;
        Ok(true)
    }
}

/// Parse complete lines from a byte span, stopping at the first malformed
/// line. Returns the parsed records and the number of bytes consumed,
/// always a newline boundary (or 0).
fn parse_complete_lines<T: DeserializeOwned>(buf: &[u8]) -> ReadOutcome<T> {
    // Locate the last newline; anything after it is a partial line.
    let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
        return ReadOutcome {
            records: Vec::new(),
            new_cursor: 0,
        };
    };
    let complete = &buf[..=last_newline];

    let mut records = Vec::new();
    let mut consumed = 0u64;
    for line in complete.split_inclusive(|&b| b == b'\n') {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            consumed += line.len() as u64;
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => {
                records.push(record);
                consumed += line.len() as u64;
            }
            Err(e) => {
                // Stop, do not skip: advancing past a malformed line would
                // swallow whatever the corruption hides.
                tracing::warn!(error = %e, "malformed channel line, halting read");
                break;
            }
        }
    }

    ReadOutcome {
        records,
        new_cursor: consumed,
    }
}

fn read_lines_if_exists(path: &Path) -> Result<Option<Vec<Vec<u8>>>, MailboxError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let lines = bytes
        .split(|&b| b == b'\n')
        .filter(|l| !l.is_empty())
        .map(|l| l.to_vec())
        .collect();
    Ok(Some(lines))
}

fn rejoin_lines(lines: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
