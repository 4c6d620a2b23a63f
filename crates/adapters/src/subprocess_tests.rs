// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn collects_output_within_the_deadline() {
    let output = run_command("echo", ["hello"], Duration::from_secs(5), "echo")
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn nonzero_exit_is_not_an_error() {
    let output = run_command("false", std::iter::empty::<&str>(), Duration::from_secs(5), "false")
        .await
        .unwrap();
    assert!(!output.status.success());
}

#[tokio::test]
async fn missing_binary_reports_io_error() {
    let err = run_command(
        "/nonexistent/binary",
        std::iter::empty::<&str>(),
        Duration::from_secs(5),
        "nonexistent",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ExecError::Io { .. }));
    assert!(err.to_string().starts_with("nonexistent failed:"));
}

#[tokio::test]
async fn deadline_cuts_off_a_slow_child() {
    let err = run_command("sleep", ["10"], Duration::from_millis(100), "test sleep")
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::TimedOut { .. }));
    assert!(err.to_string().contains("test sleep"));
    assert!(err.to_string().contains("timed out"));
}
