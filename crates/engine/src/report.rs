// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity-log view over the audit trail, and the markdown team report.

use crate::error::BridgeError;
use omc_core::{sanitize_timestamp, Clock, TaskStatus};
use omc_store::{
    AuditEvent, AuditFilter, AuditKind, AuditLog, TaskStore, TeamPaths, UsageLog, FILE_MODE,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of timeline entries the report shows.
const TIMELINE_LIMIT: usize = 50;

/// Coarse category of an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Task,
    File,
    Message,
    Lifecycle,
    Error,
}

/// One row of the activity-log view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: String,
    pub actor: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub category: ActivityCategory,
}

/// Fixed audit-kind → (action, category) mapping.
fn classify(kind: AuditKind) -> (&'static str, ActivityCategory) {
    use ActivityCategory as Cat;
    match kind {
        AuditKind::TaskClaimed => ("claimed task", Cat::Task),
        AuditKind::TaskStarted => ("started task", Cat::Task),
        AuditKind::TaskCompleted => ("completed task", Cat::Task),
        AuditKind::TaskFailed => ("failed task", Cat::Task),
        AuditKind::TaskPermanentlyFailed => ("permanently failed task", Cat::Error),
        AuditKind::WorkerQuarantined => ("entered quarantine", Cat::Error),
        AuditKind::WorkerIdle => ("went idle", Cat::Lifecycle),
        AuditKind::BridgeStart => ("started", Cat::Lifecycle),
        AuditKind::BridgeShutdown => ("shut down", Cat::Lifecycle),
        AuditKind::ShutdownReceived => ("received shutdown", Cat::Lifecycle),
        AuditKind::ShutdownAck => ("acknowledged shutdown", Cat::Lifecycle),
        AuditKind::CliSpawned => ("spawned cli", Cat::Lifecycle),
        AuditKind::CliTimeout => ("cli timed out", Cat::Error),
        AuditKind::CliError => ("cli errored", Cat::Error),
        AuditKind::InboxRotated => ("rotated inbox", Cat::Message),
        AuditKind::OutboxRotated => ("rotated outbox", Cat::Message),
        AuditKind::PermissionViolation => ("violated permissions", Cat::Error),
        AuditKind::PermissionAudit => ("flagged permission audit", Cat::File),
    }
}

/// Convert one audit event into an activity entry.
pub fn activity_from_audit(event: &AuditEvent) -> ActivityEntry {
    let (action, category) = classify(event.event_type);
    ActivityEntry {
        timestamp: event.timestamp.clone(),
        actor: event.worker_name.clone(),
        action: action.to_string(),
        target: event.task_id.clone(),
        details: event
            .details
            .as_ref()
            .map(|d| serde_json::Value::Object(d.clone()).to_string()),
        category,
    }
}

/// Filters for the activity view.
#[derive(Debug, Default, Clone)]
pub struct ActivityFilter {
    pub category: Option<ActivityCategory>,
    pub actor: Option<String>,
    pub since: Option<String>,
    pub limit: Option<usize>,
}

/// The filtered activity view of a team's audit log.
pub fn activity_log(
    audit: &AuditLog,
    team: &str,
    filter: &ActivityFilter,
) -> Result<Vec<ActivityEntry>, BridgeError> {
    let events = audit.read(
        team,
        &AuditFilter {
            worker_name: filter.actor.clone(),
            since: filter.since.clone(),
            ..AuditFilter::default()
        },
    )?;

    let mut entries = Vec::new();
    for event in &events {
        let entry = activity_from_audit(event);
        if filter.category.is_some_and(|c| c != entry.category) {
            continue;
        }
        entries.push(entry);
        if filter.limit.is_some_and(|limit| entries.len() >= limit) {
            break;
        }
    }
    Ok(entries)
}

/// Render the markdown team report.
pub fn generate_team_report<C: Clock>(
    tasks: &TaskStore<C>,
    usage: &UsageLog,
    audit: &AuditLog,
    team: &str,
    generated_at: &str,
) -> Result<String, BridgeError> {
    let mut all_tasks = Vec::new();
    for id in tasks.list_task_ids(team)? {
        if let Some(task) = tasks.read_task(team, &id)? {
            all_tasks.push(task);
        }
    }

    let completed = all_tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed && !t.is_permanently_failed())
        .count();
    let failed = all_tasks.iter().filter(|t| t.is_permanently_failed()).count();
    let in_progress = all_tasks
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
        .count();
    let pending = all_tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .count();

    let worker_usage = usage.generate_report(team)?;

    let mut out = String::new();
    out.push_str(&format!("# Team report: {}\n\n", team));

    out.push_str("## Summary\n\n");
    out.push_str(&format!(
        "- Tasks: {} total, {} completed, {} permanently failed, {} in progress, {} pending\n",
        all_tasks.len(),
        completed,
        failed,
        in_progress,
        pending
    ));
    out.push_str(&format!("- Workers with recorded usage: {}\n\n", worker_usage.len()));

    out.push_str("## Task Results\n\n");
    out.push_str("| Task | Subject | Status | Owner |\n");
    out.push_str("|------|---------|--------|-------|\n");
    for task in &all_tasks {
        let status = if task.is_permanently_failed() {
            "permanently failed".to_string()
        } else {
            task.status.to_string()
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            task.id,
            task.subject.replace('|', "\\|"),
            status,
            task.owner
        ));
    }
    out.push('\n');

    out.push_str("## Worker Performance\n\n");
    out.push_str("| Worker | Tasks | Wall clock (ms) | Prompt bytes | Response bytes |\n");
    out.push_str("|--------|-------|-----------------|--------------|----------------|\n");
    for row in &worker_usage {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            row.worker_name, row.tasks, row.wall_clock_ms, row.prompt_chars, row.response_chars
        ));
    }
    out.push('\n');

    out.push_str("## Activity Timeline\n\n");
    let activity = activity_log(audit, team, &ActivityFilter::default())?;
    let tail_start = activity.len().saturating_sub(TIMELINE_LIMIT);
    for entry in &activity[tail_start..] {
        match &entry.target {
            Some(target) => out.push_str(&format!(
                "- {} — {} {} ({})\n",
                entry.timestamp, entry.actor, entry.action, target
            )),
            None => out.push_str(&format!(
                "- {} — {} {}\n",
                entry.timestamp, entry.actor, entry.action
            )),
        }
    }
    out.push('\n');

    out.push_str("## Usage Totals\n\n");
    let total_wall: u64 = worker_usage.iter().map(|w| w.wall_clock_ms).sum();
    let total_prompt: u64 = worker_usage.iter().map(|w| w.prompt_chars).sum();
    let total_response: u64 = worker_usage.iter().map(|w| w.response_chars).sum();
    out.push_str(&format!(
        "- Wall clock: {} ms\n- Prompt bytes: {}\n- Response bytes: {}\n\n",
        total_wall, total_prompt, total_response
    ));

    out.push_str(&format!("Generated at {}\n", generated_at));
    Ok(out)
}

/// Write the report under `.omc/reports/`, named by team and timestamp.
pub fn save_team_report(
    paths: &TeamPaths,
    team: &str,
    report: &str,
    generated_at: &str,
) -> Result<PathBuf, BridgeError> {
    let path = paths.reports_dir().join(format!(
        "team-{}-{}.md",
        team,
        sanitize_timestamp(generated_at)
    ));
    omc_store::write_file_with_mode(&path, paths.project_root(), report.as_bytes(), FILE_MODE)?;
    Ok(path)
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
