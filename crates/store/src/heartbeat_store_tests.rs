// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use omc_core::{epoch_ms_to_iso, Provider, WorkerStatus};
use tempfile::TempDir;

fn fixture() -> (TempDir, HeartbeatStore) {
    let dir = TempDir::new().unwrap();
    let paths = TeamPaths::new(dir.path().join("home"), dir.path());
    let store = HeartbeatStore::new(paths);
    (dir, store)
}

fn heartbeat(worker: &str, last_poll_ms: u64) -> Heartbeat {
    Heartbeat {
        worker_name: worker.to_string(),
        team_name: "t".to_string(),
        provider: Provider::Claude,
        pid: 4242,
        last_poll_at: epoch_ms_to_iso(last_poll_ms),
        current_task_id: None,
        consecutive_errors: 0,
        status: WorkerStatus::Polling,
    }
}

fn at_ms(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64).single().unwrap()
}

const T0: u64 = 1_700_000_000_000;

#[test]
fn write_then_read_round_trips() {
    let (_dir, store) = fixture();
    let hb = heartbeat("w1", T0);
    store.write(&hb).unwrap();
    assert_eq!(store.read("t", "w1").unwrap().unwrap(), hb);
}

#[test]
fn rewrite_replaces_the_record() {
    let (_dir, store) = fixture();
    store.write(&heartbeat("w1", T0)).unwrap();

    let mut newer = heartbeat("w1", T0 + 5_000);
    newer.status = WorkerStatus::Executing;
    newer.current_task_id = Some("3".to_string());
    store.write(&newer).unwrap();

    let read = store.read("t", "w1").unwrap().unwrap();
    assert_eq!(read.status, WorkerStatus::Executing);
    assert_eq!(read.current_task_id.as_deref(), Some("3"));
}

#[test]
fn liveness_is_age_gated() {
    let (_dir, store) = fixture();
    store.write(&heartbeat("w1", T0)).unwrap();

    assert!(store
        .is_worker_alive("t", "w1", 30_000, at_ms(T0 + 10_000))
        .unwrap());
    assert!(!store
        .is_worker_alive("t", "w1", 30_000, at_ms(T0 + 30_000))
        .unwrap());
}

#[test]
fn absent_heartbeat_is_dead() {
    let (_dir, store) = fixture();
    assert!(!store
        .is_worker_alive("t", "ghost", 30_000, at_ms(T0))
        .unwrap());
}

#[test]
fn invalid_timestamp_is_dead() {
    let (_dir, store) = fixture();
    let mut hb = heartbeat("w1", T0);
    hb.last_poll_at = "yesterday-ish".to_string();
    store.write(&hb).unwrap();

    assert!(!store.is_worker_alive("t", "w1", 30_000, at_ms(T0)).unwrap());
}

#[test]
fn list_returns_team_heartbeats_sorted() {
    let (_dir, store) = fixture();
    store.write(&heartbeat("w2", T0)).unwrap();
    store.write(&heartbeat("w1", T0)).unwrap();

    let all = store.list("t").unwrap();
    let names: Vec<&str> = all.iter().map(|h| h.worker_name.as_str()).collect();
    assert_eq!(names, vec!["w1", "w2"]);
}

#[test]
fn delete_and_cleanup() {
    let (_dir, store) = fixture();
    store.write(&heartbeat("w1", T0)).unwrap();
    store.write(&heartbeat("w2", T0)).unwrap();

    store.delete("t", "w1").unwrap();
    assert!(store.read("t", "w1").unwrap().is_none());

    let removed = store.cleanup_team("t").unwrap();
    assert_eq!(removed, 1);
    assert!(store.list("t").unwrap().is_empty());

    // Idempotent.
    store.delete("t", "w1").unwrap();
    assert_eq!(store.cleanup_team("t").unwrap(), 0);
}
