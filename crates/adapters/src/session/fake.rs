// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory session host for tests.

use super::{SessionError, SessionHost};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One recorded call against the fake host.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Create { name: String, cwd: PathBuf, argv: Vec<String> },
    Kill { name: String },
}

#[derive(Default)]
struct FakeState {
    sessions: HashMap<String, Vec<String>>,
    calls: Vec<SessionCall>,
}

/// Session host that tracks sessions in memory.
#[derive(Clone, Default)]
pub struct FakeSessionHost {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSessionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<SessionCall> {
        self.state.lock().calls.clone()
    }

    /// Directly mark a session as alive (test setup).
    pub fn add_session(&self, name: &str) {
        self.state
            .lock()
            .sessions
            .insert(name.to_string(), Vec::new());
    }
}

#[async_trait]
impl SessionHost for FakeSessionHost {
    async fn create(&self, name: &str, cwd: &Path, argv: &[String]) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::Create {
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
            argv: argv.to_vec(),
        });
        state.sessions.insert(name.to_string(), argv.to_vec());
        Ok(())
    }

    async fn kill(&self, name: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::Kill {
            name: name.to_string(),
        });
        // Killing an absent session succeeds, like the real host.
        state.sessions.remove(name);
        Ok(())
    }

    async fn is_alive(&self, name: &str) -> Result<bool, SessionError> {
        Ok(self.state.lock().sessions.contains_key(name))
    }

    async fn list_active(&self) -> Result<Vec<String>, SessionError> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .sessions
            .keys()
            .filter(|n| n.starts_with("omc-"))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
