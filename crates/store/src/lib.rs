// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omc-store: Filesystem-backed state for the MCP team bridge.
//!
//! Everything the lead and the workers share lives on one host's
//! filesystem, split between a user-scoped root (`~/.claude/…`) and a
//! project-scoped root (`.omc/…`). This crate owns every byte written
//! there: the task queue with its exclusive-claim locks, the per-worker
//! JSONL channels, heartbeats, the dual registry, the audit log, usage
//! records, and restart state.

pub mod audit;
pub mod fsio;
pub mod heartbeat_store;
pub mod mailbox;
pub mod paths;
pub mod registry;
pub mod restart_store;
pub mod signals;
pub mod task_store;
pub mod usage;

pub use audit::{AuditError, AuditEvent, AuditFilter, AuditKind, AuditLog, AUDIT_MAX_SIZE};
pub use fsio::{
    append_file_with_mode, atomic_write_bytes, atomic_write_json, ensure_dir_with_mode,
    read_json, read_json_lenient, validate_resolved_path, write_file_with_mode, FsError,
    DIR_MODE, FILE_MODE,
};
pub use heartbeat_store::{heartbeat_is_fresh, HeartbeatError, HeartbeatStore};
pub use mailbox::{Mailbox, MailboxError, INBOX_MAX_BYTES};
pub use paths::TeamPaths;
pub use registry::{
    CanonicalMember, ProbeOutcome, ProbeResult, RegistrationStrategy, Registry, RegistryError,
};
pub use restart_store::{RestartState, RestartStore, RestartStoreError};
pub use signals::{SignalError, Signals};
pub use task_store::{TaskStore, TaskStoreError, STALE_LOCK_MS};
pub use usage::{measure_char_counts, UsageError, UsageLog, UsageRecord, WorkerUsage};
