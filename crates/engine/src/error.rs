// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for the bridge and the lead-side helpers.

use thiserror::Error;

/// Errors that can surface from a bridge cycle or a lead operation.
///
/// Inside the poll loop these are caught, logged, and counted toward
/// `consecutive_errors`; they never kill the daemon.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    TaskStore(#[from] omc_store::TaskStoreError),
    #[error(transparent)]
    Mailbox(#[from] omc_store::MailboxError),
    #[error(transparent)]
    Signal(#[from] omc_store::SignalError),
    #[error(transparent)]
    Heartbeat(#[from] omc_store::HeartbeatError),
    #[error(transparent)]
    Registry(#[from] omc_store::RegistryError),
    #[error(transparent)]
    Usage(#[from] omc_store::UsageError),
    #[error(transparent)]
    RestartStore(#[from] omc_store::RestartStoreError),
    #[error(transparent)]
    Fs(#[from] omc_store::FsError),
    #[error(transparent)]
    Audit(#[from] omc_store::AuditError),
    #[error(transparent)]
    Git(#[from] omc_adapters::GitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("member not found: {0}")]
    MemberNotFound(String),
}
