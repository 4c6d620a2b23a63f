// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

fn fixture() -> (TempDir, AuditLog, TeamPaths) {
    let dir = TempDir::new().unwrap();
    let paths = TeamPaths::new(dir.path().join("home"), dir.path());
    let log = AuditLog::new(paths.clone());
    (dir, log, paths)
}

fn event(kind: AuditKind, worker: &str, ts: &str) -> AuditEvent {
    AuditEvent::new(kind, "t", worker, ts)
}

#[test]
fn append_then_read_round_trips() {
    let (_dir, log, _) = fixture();
    let ev = event(AuditKind::TaskClaimed, "w1", "2026-02-01T10:00:00.000Z")
        .with_task("3")
        .with_detail("attempt", serde_json::json!(1));
    log.append(&ev);

    let got = log.read("t", &AuditFilter::default()).unwrap();
    assert_eq!(got, vec![ev]);
}

#[test]
fn filters_apply_inline() {
    let (_dir, log, _) = fixture();
    log.append(&event(AuditKind::TaskClaimed, "w1", "2026-02-01T10:00:00.000Z"));
    log.append(&event(AuditKind::TaskCompleted, "w1", "2026-02-01T10:01:00.000Z"));
    log.append(&event(AuditKind::TaskClaimed, "w2", "2026-02-01T10:02:00.000Z"));

    let by_kind = log
        .read(
            "t",
            &AuditFilter {
                event_type: Some(AuditKind::TaskClaimed),
                ..AuditFilter::default()
            },
        )
        .unwrap();
    assert_eq!(by_kind.len(), 2);

    let by_worker = log
        .read(
            "t",
            &AuditFilter {
                worker_name: Some("w2".to_string()),
                ..AuditFilter::default()
            },
        )
        .unwrap();
    assert_eq!(by_worker.len(), 1);

    let since = log
        .read(
            "t",
            &AuditFilter {
                since: Some("2026-02-01T10:01:00.000Z".to_string()),
                ..AuditFilter::default()
            },
        )
        .unwrap();
    assert_eq!(since.len(), 2);

    let limited = log
        .read(
            "t",
            &AuditFilter {
                limit: Some(1),
                ..AuditFilter::default()
            },
        )
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].event_type, AuditKind::TaskClaimed);
}

#[test]
fn malformed_lines_are_skipped() {
    let (_dir, log, paths) = fixture();
    log.append(&event(AuditKind::BridgeStart, "w1", "2026-02-01T10:00:00.000Z"));

    let path = paths.audit_log_path("t");
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("corrupt line\n");
    std::fs::write(&path, content).unwrap();
    log.append(&event(AuditKind::BridgeShutdown, "w1", "2026-02-01T10:05:00.000Z"));

    let got = log.read("t", &AuditFilter::default()).unwrap();
    assert_eq!(got.len(), 2);
}

#[test]
fn rotation_keeps_the_most_recent_half() {
    let (_dir, log, paths) = fixture();
    for i in 0..10 {
        log.append(&event(
            AuditKind::WorkerIdle,
            "w1",
            &format!("2026-02-01T10:00:0{}.000Z", i),
        ));
    }

    let rotated = log.rotate_if_needed("t", 100).unwrap();
    assert!(rotated);

    let got = log.read("t", &AuditFilter::default()).unwrap();
    assert_eq!(got.len(), 5);
    assert_eq!(got[0].timestamp, "2026-02-01T10:00:05.000Z");
    assert_eq!(got[4].timestamp, "2026-02-01T10:00:09.000Z");

    let mode = std::fs::metadata(paths.audit_log_path("t"))
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}

#[test]
fn rotation_below_threshold_is_a_noop() {
    let (_dir, log, _) = fixture();
    log.append(&event(AuditKind::WorkerIdle, "w1", "2026-02-01T10:00:00.000Z"));
    assert!(!log.rotate_if_needed("t", AUDIT_MAX_SIZE).unwrap());
}

#[test]
fn rotation_survives_a_planted_temp_symlink() {
    let (dir, log, paths) = fixture();
    for i in 0..10 {
        log.append(&event(
            AuditKind::WorkerIdle,
            "w1",
            &format!("2026-02-01T10:00:0{}.000Z", i),
        ));
    }

    // Plant a symlink at the temp path pointing outside the tree.
    let target = dir.path().join("victim.jsonl");
    let mut tmp = paths.audit_log_path("t").into_os_string();
    tmp.push(".tmp");
    std::os::unix::fs::symlink(&target, std::path::PathBuf::from(&tmp)).unwrap();

    assert!(log.rotate_if_needed("t", 100).unwrap());
    assert!(!target.exists(), "rotation must not write through the symlink");
    assert_eq!(log.read("t", &AuditFilter::default()).unwrap().len(), 5);
}

#[test]
fn append_never_panics_on_unwritable_destination() {
    // Project root that cannot exist as a directory.
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "file, not dir").unwrap();
    let paths = TeamPaths::new(dir.path().join("home"), &blocker);
    let log = AuditLog::new(paths);

    // Must not panic or error upward.
    log.append(&event(AuditKind::BridgeStart, "w1", "2026-02-01T10:00:00.000Z"));
}
