// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omc-core: Data model for the MCP team bridge

pub mod clock;
pub mod config;
pub mod heartbeat;
pub mod member;
pub mod message;
pub mod name;
pub mod task;
pub mod time_fmt;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{BridgeConfig, ConfigError, PermissionEnforcement, PermissionsConfig};
pub use heartbeat::{Heartbeat, WorkerStatus};
pub use member::{MemberRecord, Provider, BACKEND_TMUX};
pub use message::{InboxKind, InboxMessage, OutboxKind, OutboxMessage, SignalPayload};
pub use name::{
    sanitize_name, session_name, validate_branch_name, validate_task_id, NameError,
};
pub use task::{Task, TaskFailure, TaskStatus};
pub use time_fmt::{epoch_ms_to_iso, format_iso_utc, iso_now, parse_iso, sanitize_timestamp};
