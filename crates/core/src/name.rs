// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name sanitization for teams, workers, tasks, and branches.
//!
//! Every string that ends up embedded in a filesystem path, a tmux session
//! name, or a git argv goes through one of these functions first.

use thiserror::Error;

/// Errors from name validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("invalid name: {0:?}")]
    Invalid(String),
    #[error("invalid task id: {0:?}")]
    InvalidTaskId(String),
    #[error("invalid branch name: {0:?}")]
    InvalidBranch(String),
}

/// Sanitize a team or worker name.
///
/// Strips every character outside `[A-Za-z0-9_.-]`, then strips leading
/// characters until the name starts with an alphanumeric. An empty result
/// is rejected.
pub fn sanitize_name(raw: &str) -> Result<String, NameError> {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let sanitized: String = stripped
        .chars()
        .skip_while(|c| !c.is_ascii_alphanumeric())
        .collect();

    if sanitized.is_empty() {
        return Err(NameError::Invalid(raw.to_string()));
    }
    Ok(sanitized)
}

/// Validate a task id: `^[A-Za-z0-9._-]+$`.
///
/// Unlike [`sanitize_name`] nothing is stripped: a task id either matches
/// or is rejected, since ids are referenced across records (blockers).
pub fn validate_task_id(id: &str) -> Result<(), NameError> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(NameError::InvalidTaskId(id.to_string()))
    }
}

/// Validate a git branch name: `^[a-zA-Z0-9][a-zA-Z0-9/_.-]*$`.
///
/// The leading-alphanumeric requirement forecloses flag injection when the
/// branch is passed as argv to git.
pub fn validate_branch_name(branch: &str) -> Result<(), NameError> {
    let mut chars = branch.chars();
    let head_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.' | '-'));
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(NameError::InvalidBranch(branch.to_string()))
    }
}

/// Canonical tmux session name for a worker: `omc-{team}-{worker}`.
///
/// Both fragments must already be sanitized.
pub fn session_name(team: &str, worker: &str) -> String {
    format!("omc-{}-{}", team, worker)
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
