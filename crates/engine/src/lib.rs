// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omc-engine: The worker bridge and the lead's coordination logic.
//!
//! The bridge daemon's poll loop lives here, together with the permission
//! layer it audits against, the prompt builder it feeds the provider CLIs,
//! and the lead-side pieces: the unified membership view, the task router,
//! the restart policy, and the team report generator.

pub mod bridge;
pub mod error;
pub mod permissions;
pub mod prompt;
pub mod report;
pub mod restart;
pub mod router;
pub mod view;

pub use bridge::Bridge;
pub use error::BridgeError;
pub use permissions::{
    find_permission_violations, format_permission_instructions, glob_match,
    EffectivePermissions, PathDecision, PermissionViolation, SECURE_DENY_DEFAULTS,
};
pub use prompt::{build_task_prompt, DESCRIPTION_CAP, INBOX_ITEM_CAP, INBOX_TOTAL_CAP, PROMPT_CAP, SUBJECT_CAP};
pub use report::{
    activity_from_audit, activity_log, generate_team_report, save_team_report, ActivityCategory,
    ActivityEntry, ActivityFilter,
};
pub use restart::{
    clear_restart_state, record_restart, should_restart, synthesize_bridge_config, RestartPolicy,
};
pub use router::{
    broadcast_to_team, default_capabilities, route_message, route_tasks, score_worker_fitness,
    MessageRoute, RouteDecision, BACKEND_CLAUDE_NATIVE,
};
pub use view::{project_status, team_members, MemberView, StatusProjection, DEFAULT_LIVENESS_MS};
