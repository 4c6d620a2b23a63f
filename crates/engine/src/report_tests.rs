// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use omc_core::{FakeClock, Provider, Task, TaskStatus};
use omc_store::{AuditEvent, UsageRecord};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    paths: TeamPaths,
    tasks: TaskStore<FakeClock>,
    usage: UsageLog,
    audit: AuditLog,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let paths = TeamPaths::new(dir.path().join("home"), dir.path().join("proj"));
    Fixture {
        tasks: TaskStore::with_clock(paths.clone(), FakeClock::default()),
        usage: UsageLog::new(paths.clone()),
        audit: AuditLog::new(paths.clone()),
        paths,
        _dir: dir,
    }
}

fn audit_event(fx: &Fixture, kind: AuditKind, worker: &str, ts: &str) {
    fx.audit.append(&AuditEvent::new(kind, "t", worker, ts));
}

// ── Activity view ────────────────────────────────────────────────────────

#[yare::parameterized(
    claimed     = { AuditKind::TaskClaimed, ActivityCategory::Task },
    completed   = { AuditKind::TaskCompleted, ActivityCategory::Task },
    permanent   = { AuditKind::TaskPermanentlyFailed, ActivityCategory::Error },
    quarantine  = { AuditKind::WorkerQuarantined, ActivityCategory::Error },
    idle        = { AuditKind::WorkerIdle, ActivityCategory::Lifecycle },
    start       = { AuditKind::BridgeStart, ActivityCategory::Lifecycle },
    inbox_rot   = { AuditKind::InboxRotated, ActivityCategory::Message },
    outbox_rot  = { AuditKind::OutboxRotated, ActivityCategory::Message },
    cli_timeout = { AuditKind::CliTimeout, ActivityCategory::Error },
    perm_audit  = { AuditKind::PermissionAudit, ActivityCategory::File },
)]
fn audit_kinds_map_to_categories(kind: AuditKind, expected: ActivityCategory) {
    let event = AuditEvent::new(kind, "t", "w1", "ts");
    assert_eq!(activity_from_audit(&event).category, expected);
}

#[test]
fn activity_entry_carries_actor_and_target() {
    let event = AuditEvent::new(AuditKind::TaskClaimed, "t", "w1", "ts").with_task("3");
    let entry = activity_from_audit(&event);
    assert_eq!(entry.actor, "w1");
    assert_eq!(entry.target.as_deref(), Some("3"));
    assert_eq!(entry.action, "claimed task");
}

#[test]
fn activity_log_filters_by_category_actor_and_limit() {
    let fx = fixture();
    audit_event(&fx, AuditKind::TaskClaimed, "w1", "2026-02-01T10:00:00.000Z");
    audit_event(&fx, AuditKind::WorkerIdle, "w1", "2026-02-01T10:00:01.000Z");
    audit_event(&fx, AuditKind::TaskClaimed, "w2", "2026-02-01T10:00:02.000Z");

    let by_category = activity_log(
        &fx.audit,
        "t",
        &ActivityFilter {
            category: Some(ActivityCategory::Task),
            ..ActivityFilter::default()
        },
    )
    .unwrap();
    assert_eq!(by_category.len(), 2);

    let by_actor = activity_log(
        &fx.audit,
        "t",
        &ActivityFilter {
            actor: Some("w2".to_string()),
            ..ActivityFilter::default()
        },
    )
    .unwrap();
    assert_eq!(by_actor.len(), 1);

    let limited = activity_log(
        &fx.audit,
        "t",
        &ActivityFilter {
            limit: Some(1),
            ..ActivityFilter::default()
        },
    )
    .unwrap();
    assert_eq!(limited.len(), 1);
}

// ── Team report ──────────────────────────────────────────────────────────

fn seed_report_data(fx: &Fixture) {
    let mut done = Task::new("1", "Ship parser", "w1");
    done.status = TaskStatus::Completed;
    fx.tasks.write_task("t", &done).unwrap();

    let mut failed = Task::new("2", "Flaky deploy", "w2");
    failed.status = TaskStatus::Completed;
    failed
        .metadata_mut()
        .insert("permanentlyFailed".to_string(), serde_json::json!(true));
    fx.tasks.write_task("t", &failed).unwrap();

    fx.tasks.write_task("t", &Task::new("3", "Later", "w1")).unwrap();

    fx.usage
        .record(
            "t",
            &UsageRecord {
                task_id: "1".to_string(),
                worker_name: "w1".to_string(),
                provider: Provider::Claude,
                model: None,
                started_at: "s".to_string(),
                completed_at: "c".to_string(),
                wall_clock_ms: 1_234,
                prompt_chars: 100,
                response_chars: 200,
            },
        )
        .unwrap();

    audit_event(&fx, AuditKind::TaskClaimed, "w1", "2026-02-01T10:00:00.000Z");
    audit_event(&fx, AuditKind::TaskCompleted, "w1", "2026-02-01T10:01:00.000Z");
}

#[test]
fn report_has_every_section() {
    let fx = fixture();
    seed_report_data(&fx);

    let report = generate_team_report(
        &fx.tasks,
        &fx.usage,
        &fx.audit,
        "t",
        "2026-02-01T12:00:00.000Z",
    )
    .unwrap();

    assert!(report.contains("# Team report: t"));
    assert!(report.contains("## Summary"));
    assert!(report.contains("## Task Results"));
    assert!(report.contains("## Worker Performance"));
    assert!(report.contains("## Activity Timeline"));
    assert!(report.contains("## Usage Totals"));
    assert!(report.contains("Generated at 2026-02-01T12:00:00.000Z"));

    // Content spot checks.
    assert!(report.contains("3 total, 1 completed, 1 permanently failed, 0 in progress, 1 pending"));
    assert!(report.contains("| 2 | Flaky deploy | permanently failed | w2 |"));
    assert!(report.contains("| w1 | 1 | 1234 | 100 | 200 |"));
    assert!(report.contains("w1 claimed task"));
}

#[test]
fn timeline_is_limited_to_the_most_recent_entries() {
    let fx = fixture();
    for i in 0..60 {
        audit_event(
            &fx,
            AuditKind::WorkerIdle,
            "w1",
            &format!("2026-02-01T10:{:02}:00.000Z", i),
        );
    }

    let report = generate_team_report(&fx.tasks, &fx.usage, &fx.audit, "t", "now").unwrap();
    let timeline_lines = report
        .lines()
        .filter(|l| l.starts_with("- 2026-02-01T10:"))
        .count();
    assert_eq!(timeline_lines, 50);
    // The oldest ten were dropped.
    assert!(!report.contains("2026-02-01T10:09:00.000Z"));
    assert!(report.contains("2026-02-01T10:59:00.000Z"));
}

#[test]
fn saved_report_lands_in_the_reports_dir() {
    let fx = fixture();
    seed_report_data(&fx);
    let report =
        generate_team_report(&fx.tasks, &fx.usage, &fx.audit, "t", "2026-02-01T12:00:00.000Z")
            .unwrap();

    let path = save_team_report(&fx.paths, "t", &report, "2026-02-01T12:00:00.000Z").unwrap();
    assert!(path.starts_with(fx.paths.reports_dir()));
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "team-t-2026-02-01T12-00-00-000Z.md"
    );
    assert_eq!(std::fs::read_to_string(path).unwrap(), report);
}
