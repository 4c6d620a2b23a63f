// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use omc_core::FakeClock;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    store: TaskStore<FakeClock>,
    paths: TeamPaths,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let paths = TeamPaths::new(dir.path(), dir.path().join("proj"));
    let clock = FakeClock::at_epoch_ms(1_700_000_000_000);
    let store = TaskStore::with_clock(paths.clone(), clock.clone());
    Fixture {
        _dir: dir,
        store,
        paths,
    }
}

fn seed(fx: &Fixture, task: &Task) {
    fx.store.write_task("t", task).unwrap();
}

fn pending(id: &str, owner: &str, blocked_by: &[&str]) -> Task {
    let mut task = Task::new(id, format!("task {}", id), owner);
    task.blocked_by = blocked_by.iter().map(|s| s.to_string()).collect();
    task
}

/// Spawn and reap a short-lived child to obtain a pid that is dead.
fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

// ── Claiming ─────────────────────────────────────────────────────────────

#[test]
fn concurrent_claims_produce_exactly_one_winner() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));

    let results: Vec<Option<Task>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = fx.store.clone();
                scope.spawn(move || store.find_next_task("t", "w1").unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<&Task> = results.iter().flatten().collect();
    assert_eq!(winners.len(), 1, "exactly one concurrent claim must win");
    assert_eq!(winners[0].status, TaskStatus::InProgress);
    assert_eq!(winners[0].claimed_by.as_deref(), Some("w1"));

    let on_disk = fx.store.read_task("t", "1").unwrap().unwrap();
    assert_eq!(on_disk.status, TaskStatus::InProgress);
    assert!(!fx.paths.task_lock_path("t", "1").exists());
}

#[test]
fn blocked_task_is_skipped_until_blocker_completes() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));
    seed(&fx, &pending("2", "w1", &["1"]));

    let first = fx.store.find_next_task("t", "w1").unwrap().unwrap();
    assert_eq!(first.id, "1");

    fx.store
        .update_task("t", "1", |t| t.status = TaskStatus::Completed, true)
        .unwrap();

    let second = fx.store.find_next_task("t", "w1").unwrap().unwrap();
    assert_eq!(second.id, "2");
}

#[test]
fn pending_blocker_gates_even_when_it_is_the_later_id() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));
    seed(&fx, &pending("2", "w1", &["1"]));

    // Only task 1 is claimable while 1 is pending.
    let got = fx.store.find_next_task("t", "w1").unwrap().unwrap();
    assert_eq!(got.id, "1");
    assert!(fx.store.find_next_task("t", "w1").unwrap().is_none());
}

#[test]
fn tasks_owned_by_others_are_not_claimed() {
    let fx = fixture();
    seed(&fx, &pending("1", "other", &[]));
    assert!(fx.store.find_next_task("t", "w1").unwrap().is_none());
}

#[test]
fn missing_blocker_counts_as_unresolved() {
    let fx = fixture();
    seed(&fx, &pending("2", "w1", &["ghost"]));
    assert!(fx.store.find_next_task("t", "w1").unwrap().is_none());
}

#[test]
fn ids_scan_in_numeric_preferring_order() {
    let fx = fixture();
    for id in ["10", "2", "1"] {
        seed(&fx, &pending(id, "w1", &[]));
    }
    let ids = fx.store.list_task_ids("t").unwrap();
    assert_eq!(ids, vec!["1", "2", "10"]);

    let first = fx.store.find_next_task("t", "w1").unwrap().unwrap();
    assert_eq!(first.id, "1");
}

#[test]
fn claim_records_pid_and_timestamp() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));

    let claimed = fx.store.find_next_task("t", "w1").unwrap().unwrap();
    assert_eq!(claimed.claim_pid, Some(std::process::id()));
    assert_eq!(claimed.claimed_at, Some(1_700_000_000_000));
}

// ── Stale locks ──────────────────────────────────────────────────────────

#[test]
fn stale_lock_of_dead_pid_is_reaped() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));

    // Plant a lock from a pid known to be dead, backdated past the stale
    // window.
    let lock = fx.paths.task_lock_path("t", "1");
    std::fs::write(
        &lock,
        serde_json::json!({
            "pid": dead_pid(),
            "workerName": "ghost",
            "timestamp": 1_700_000_000_000u64 - 60_000
        })
        .to_string(),
    )
    .unwrap();

    let claimed = fx.store.find_next_task("t", "w1").unwrap();
    assert!(claimed.is_some());
    assert!(!lock.exists());
}

#[test]
fn lock_of_live_pid_is_honoured_even_when_old() {
    let fx = fixture();
    let store = fx.store.clone().with_stale_lock_ms(1);
    seed(&fx, &pending("1", "w1", &[]));

    let lock = fx.paths.task_lock_path("t", "1");
    std::fs::write(
        &lock,
        serde_json::json!({
            "pid": std::process::id(),
            "workerName": "rival",
            "timestamp": 1_700_000_000_000u64 - 60_000
        })
        .to_string(),
    )
    .unwrap();

    assert!(store.find_next_task("t", "w1").unwrap().is_none());
    assert!(lock.exists());
}

#[test]
fn fresh_lock_is_honoured_regardless_of_pid() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));

    let lock = fx.paths.task_lock_path("t", "1");
    std::fs::write(
        &lock,
        serde_json::json!({
            "pid": 4_000_000u32,
            "workerName": "ghost",
            "timestamp": 1_700_000_000_000u64
        })
        .to_string(),
    )
    .unwrap();

    assert!(fx.store.find_next_task("t", "w1").unwrap().is_none());
}

#[test]
fn malformed_lock_payload_is_stale_once_old_by_mtime() {
    // The malformed-payload fallback compares the fake clock against the
    // real file mtime, so seed the clock from wall-clock time.
    let dir = TempDir::new().unwrap();
    let paths = TeamPaths::new(dir.path(), dir.path().join("proj"));
    let real_now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    let clock = FakeClock::at_epoch_ms(real_now_ms);
    let store = TaskStore::with_clock(paths.clone(), clock.clone());
    store.write_task("t", &pending("1", "w1", &[])).unwrap();

    let lock = paths.task_lock_path("t", "1");
    std::fs::write(&lock, "garbage").unwrap();

    // Fresh mtime: honoured.
    assert!(store.find_next_task("t", "w1").unwrap().is_none());

    // Advance the clock past the stale window; the mtime is now old.
    clock.advance_ms(STALE_LOCK_MS as i64 + 1_000);
    assert!(store.find_next_task("t", "w1").unwrap().is_some());
}

// ── Updates ──────────────────────────────────────────────────────────────

#[test]
fn update_preserves_unknown_fields() {
    let fx = fixture();
    let raw = serde_json::json!({
        "id": "1",
        "subject": "s",
        "status": "pending",
        "owner": "w1",
        "foreignKey": "kept"
    });
    std::fs::create_dir_all(fx.paths.tasks_dir("t")).unwrap();
    std::fs::write(fx.paths.task_path("t", "1"), raw.to_string()).unwrap();

    fx.store
        .update_task("t", "1", |t| t.status = TaskStatus::Completed, true)
        .unwrap();

    let back: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fx.paths.task_path("t", "1")).unwrap())
            .unwrap();
    assert_eq!(back["status"], "completed");
    assert_eq!(back["foreignKey"], "kept");
}

#[test]
fn update_of_missing_task_fails() {
    let fx = fixture();
    let err = fx
        .store
        .update_task("t", "nope", |_| {}, true)
        .unwrap_err();
    assert!(matches!(err, TaskStoreError::TaskNotFound(_)));
}

#[test]
fn update_falls_back_to_unlocked_when_lock_held() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));

    // Hold the lock with a live pid.
    let lock = fx.paths.task_lock_path("t", "1");
    std::fs::write(
        &lock,
        serde_json::json!({
            "pid": std::process::id(),
            "workerName": "rival",
            "timestamp": 1_700_000_000_000u64
        })
        .to_string(),
    )
    .unwrap();

    let updated = fx
        .store
        .update_task("t", "1", |t| t.subject = "patched".to_string(), true)
        .unwrap();
    assert_eq!(updated.subject, "patched");
    assert!(lock.exists(), "foreign lock must not be removed");
}

#[test]
fn task_ids_outside_the_safe_class_are_rejected() {
    let fx = fixture();
    let err = fx
        .store
        .write_task("t", &pending("../escape", "w1", &[]))
        .unwrap_err();
    assert!(matches!(err, TaskStoreError::Name(_)));
}

#[test]
fn malformed_task_reads_as_none() {
    let fx = fixture();
    std::fs::create_dir_all(fx.paths.tasks_dir("t")).unwrap();
    std::fs::write(fx.paths.task_path("t", "bad"), "{oops").unwrap();
    assert!(fx.store.read_task("t", "bad").unwrap().is_none());
}

// ── With-lock helper ─────────────────────────────────────────────────────

#[test]
fn with_task_lock_runs_and_releases() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));

    let out = fx
        .store
        .with_task_lock("t", "1", "w1", || Ok(42))
        .unwrap();
    assert_eq!(out, Some(42));
    assert!(!fx.paths.task_lock_path("t", "1").exists());
}

#[test]
fn with_task_lock_returns_none_when_contended() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));
    std::fs::write(
        fx.paths.task_lock_path("t", "1"),
        serde_json::json!({
            "pid": std::process::id(),
            "workerName": "rival",
            "timestamp": 1_700_000_000_000u64
        })
        .to_string(),
    )
    .unwrap();

    let out = fx
        .store
        .with_task_lock("t", "1", "w1", || Ok(42))
        .unwrap();
    assert_eq!(out, None);
}

#[test]
fn with_task_lock_releases_on_error() {
    let fx = fixture();
    seed(&fx, &pending("1", "w1", &[]));

    let result: Result<Option<()>, _> = fx.store.with_task_lock("t", "1", "w1", || {
        Err(TaskStoreError::TaskNotFound("boom".to_string()))
    });
    assert!(result.is_err());
    assert!(!fx.paths.task_lock_path("t", "1").exists());
}

// ── Failure sidecar ──────────────────────────────────────────────────────

#[test]
fn failure_sidecar_increments() {
    let fx = fixture();
    let first = fx.store.write_task_failure("t", "1", "boom").unwrap();
    assert_eq!(first.retry_count, 1);

    let second = fx.store.write_task_failure("t", "1", "boom again").unwrap();
    assert_eq!(second.retry_count, 2);
    assert_eq!(second.last_error, "boom again");

    let read = fx.store.read_task_failure("t", "1").unwrap().unwrap();
    assert_eq!(read, second);
}

#[test]
fn retry_exhaustion_gates_on_max() {
    let fx = fixture();
    for _ in 0..2 {
        fx.store.write_task_failure("t", "1", "boom").unwrap();
    }
    assert!(!fx.store.is_task_retry_exhausted("t", "1", 3).unwrap());
    fx.store.write_task_failure("t", "1", "boom").unwrap();
    assert!(fx.store.is_task_retry_exhausted("t", "1", 3).unwrap());
}

#[test]
fn no_sidecar_means_not_exhausted() {
    let fx = fixture();
    assert!(!fx.store.is_task_retry_exhausted("t", "zzz", 1).unwrap());
}
