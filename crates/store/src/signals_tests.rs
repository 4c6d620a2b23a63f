// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn fixture() -> (TempDir, Signals, TeamPaths) {
    let dir = TempDir::new().unwrap();
    let paths = TeamPaths::new(dir.path(), dir.path().join("proj"));
    let signals = Signals::new(paths.clone());
    (dir, signals, paths)
}

fn payload() -> SignalPayload {
    SignalPayload {
        request_id: "req-1".to_string(),
        reason: "deploy".to_string(),
        timestamp: "2026-02-01T10:00:00.000Z".to_string(),
    }
}

#[test]
fn shutdown_write_check_delete_check() {
    let (_dir, signals, _) = fixture();

    assert!(signals.check_shutdown("t", "w1").unwrap().is_none());

    signals.write_shutdown("t", "w1", &payload()).unwrap();
    let first = signals.check_shutdown("t", "w1").unwrap().unwrap();
    assert_eq!(first, payload());

    // Level-triggered: checking does not consume.
    let second = signals.check_shutdown("t", "w1").unwrap().unwrap();
    assert_eq!(second, payload());

    signals.clear_shutdown("t", "w1").unwrap();
    assert!(signals.check_shutdown("t", "w1").unwrap().is_none());
}

#[test]
fn drain_is_a_separate_flag() {
    let (_dir, signals, _) = fixture();
    signals.write_drain("t", "w1", &payload()).unwrap();

    assert!(signals.check_shutdown("t", "w1").unwrap().is_none());
    assert!(signals.check_drain("t", "w1").unwrap().is_some());

    signals.clear_drain("t", "w1").unwrap();
    assert!(signals.check_drain("t", "w1").unwrap().is_none());
}

#[test]
fn clearing_an_absent_signal_is_a_noop() {
    let (_dir, signals, _) = fixture();
    signals.clear_shutdown("t", "w1").unwrap();
    signals.clear_drain("t", "w1").unwrap();
}

#[test]
fn request_shutdown_generates_a_unique_request_id() {
    let (_dir, signals, _) = fixture();
    let first = signals
        .request_shutdown("t", "w1", "deploy", "ts".to_string())
        .unwrap();
    let second = signals
        .request_drain("t", "w2", "deploy", "ts".to_string())
        .unwrap();

    assert!(!first.request_id.is_empty());
    assert_ne!(first.request_id, second.request_id);
    assert_eq!(
        signals.check_shutdown("t", "w1").unwrap().unwrap(),
        first
    );
    assert_eq!(signals.check_drain("t", "w2").unwrap().unwrap(), second);
}

#[test]
fn malformed_payload_still_signals() {
    let (_dir, signals, paths) = fixture();
    let path = paths.shutdown_signal_path("t", "w1");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{not json").unwrap();

    let got = signals.check_shutdown("t", "w1").unwrap().unwrap();
    assert!(got.request_id.is_empty());
}
