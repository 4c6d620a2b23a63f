// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable CLI runner for tests.

use super::{CliError, CliRequest, CliResponse, CliRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

type RunHook = Box<dyn Fn(&CliRequest) + Send + Sync>;

/// One scripted outcome for a run.
enum FakeOutcome {
    Respond(String),
    Fail(CliError),
    /// Park until the request's cancellation token trips, then reject
    /// with [`CliError::Cancelled`], like the real runner does.
    HangUntilCancelled,
}

#[derive(Default)]
struct FakeState {
    outcomes: VecDeque<FakeOutcome>,
    requests: Vec<CliRequest>,
    on_run: Option<RunHook>,
}

/// CLI runner that replays scripted outcomes in order.
///
/// When the script is exhausted, runs succeed with an empty response.
#[derive(Clone, Default)]
pub struct FakeCliRunner {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCliRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful run returning `text`.
    pub fn push_response(&self, text: &str) {
        self.state
            .lock()
            .outcomes
            .push_back(FakeOutcome::Respond(text.to_string()));
    }

    /// Queue a failing run.
    pub fn push_error(&self, error: CliError) {
        self.state.lock().outcomes.push_back(FakeOutcome::Fail(error));
    }

    /// Queue a run that blocks until its cancellation token trips.
    pub fn push_hang_until_cancelled(&self) {
        self.state
            .lock()
            .outcomes
            .push_back(FakeOutcome::HangUntilCancelled);
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<CliRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of runs performed.
    pub fn run_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Install a side effect executed on every run (e.g. simulating the
    /// CLI editing files in the working directory).
    pub fn set_on_run(&self, hook: impl Fn(&CliRequest) + Send + Sync + 'static) {
        self.state.lock().on_run = Some(Box::new(hook));
    }
}

#[async_trait]
impl CliRunner for FakeCliRunner {
    async fn run(&self, request: &CliRequest) -> Result<CliResponse, CliError> {
        // Pop under the lock, then release it before any await.
        let outcome = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            if let Some(hook) = &state.on_run {
                hook(request);
            }
            state.outcomes.pop_front()
        };

        match outcome {
            Some(FakeOutcome::Respond(text)) => Ok(CliResponse { text }),
            Some(FakeOutcome::Fail(error)) => Err(error),
            Some(FakeOutcome::HangUntilCancelled) => {
                request.cancel.cancelled().await;
                Err(CliError::Cancelled)
            }
            None => Ok(CliResponse {
                text: String::new(),
            }),
        }
    }
}
