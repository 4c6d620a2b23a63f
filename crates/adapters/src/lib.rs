// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omc-adapters: Process-boundary adapters for the MCP team bridge.
//!
//! Everything that talks to another binary lives here: the terminal
//! multiplexer hosting worker sessions, the provider CLIs executing tasks,
//! and git for worktrees and merges. Each seam is a trait with a fake
//! implementation for tests.

pub mod cli;
pub mod git;
pub mod session;
pub mod subprocess;

pub use cli::{
    extract_stream_response, CliError, CliRequest, CliResponse, CliRunner, ProcessCliRunner,
    RESPONSE_CAP_BYTES, TRUNCATION_MARKER,
};
pub use git::{
    changed_files, check_merge_conflicts, create_worker_worktree, list_worktree_records,
    merge_all_worker_branches, merge_worker_branch, remove_worker_worktree, worker_branch_name,
    worker_worktree_path, GitError, MergeOutcome, WorktreeRecord,
};
pub use session::{
    is_worker_session_alive, kill_worker_session, spawn_bridge_in_session, SessionError,
    SessionHost, TmuxSessionHost,
};

#[cfg(any(test, feature = "test-support"))]
pub use cli::FakeCliRunner;
#[cfg(any(test, feature = "test-support"))]
pub use session::FakeSessionHost;
