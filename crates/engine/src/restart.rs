// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker restart policy: bounded exponential backoff.
//!
//! The supervisor (external) asks [`should_restart`] before respawning a
//! worker; the persisted counter lives in the restart sidecar. A
//! `BridgeConfig` is never written to disk; restarts re-synthesize it
//! from the worker's registry row.

use crate::error::BridgeError;
use omc_core::{BridgeConfig, MemberRecord, Provider};
use omc_store::{RestartState, RestartStore};

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub multiplier: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            backoff_base_ms: 5_000,
            backoff_max_ms: 60_000,
            multiplier: 2,
        }
    }
}

impl RestartPolicy {
    /// Backoff before restart number `restart_count + 1`, clamped to max.
    pub fn backoff_ms(&self, restart_count: u32) -> u64 {
        let factor = (self.multiplier as u64).saturating_pow(restart_count);
        self.backoff_base_ms
            .saturating_mul(factor)
            .min(self.backoff_max_ms)
    }
}

/// Backoff to wait before restarting, or `None` once the budget is spent.
pub fn should_restart(
    store: &RestartStore,
    team: &str,
    worker: &str,
    policy: &RestartPolicy,
) -> Result<Option<u64>, BridgeError> {
    let count = store
        .read(team, worker)?
        .map(|s| s.restart_count)
        .unwrap_or(0);
    if count >= policy.max_restarts {
        return Ok(None);
    }
    Ok(Some(policy.backoff_ms(count)))
}

/// Bump the persisted counter and the next backoff.
pub fn record_restart(
    store: &RestartStore,
    team: &str,
    worker: &str,
    policy: &RestartPolicy,
    now_iso: &str,
) -> Result<RestartState, BridgeError> {
    let count = store
        .read(team, worker)?
        .map(|s| s.restart_count)
        .unwrap_or(0)
        + 1;
    let state = RestartState {
        worker_name: worker.to_string(),
        restart_count: count,
        last_restart_at: now_iso.to_string(),
        next_backoff_ms: policy.backoff_ms(count),
    };
    store.write(team, &state)?;
    Ok(state)
}

/// Forget restart history after a clean run.
pub fn clear_restart_state(
    store: &RestartStore,
    team: &str,
    worker: &str,
) -> Result<(), BridgeError> {
    store.clear(team, worker)?;
    Ok(())
}

/// Rebuild a worker's `BridgeConfig` from its registry row.
///
/// `None` when the row is not an MCP worker (no provider to spawn).
/// Tunables come back as defaults; the supervisor overlays any overrides
/// it kept.
pub fn synthesize_bridge_config(member: &MemberRecord, team: &str) -> Option<BridgeConfig> {
    let provider: Provider = member.provider()?;
    let config = serde_json::json!({
        "teamName": team,
        "workerName": member.name,
        "provider": provider,
        "model": member.model,
        "workingDirectory": member.cwd,
    });
    serde_json::from_value(config).ok()
}

#[cfg(test)]
#[path = "restart_tests.rs"]
mod tests;
