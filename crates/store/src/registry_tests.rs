// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use omc_core::Provider;
use std::path::PathBuf;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    registry: Registry,
    paths: TeamPaths,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let paths = TeamPaths::new(dir.path().join("home"), dir.path().join("proj"));
    let registry = Registry::new(paths.clone());
    Fixture {
        _dir: dir,
        registry,
        paths,
    }
}

fn member(team: &str, worker: &str) -> MemberRecord {
    MemberRecord::new(
        team,
        worker,
        Provider::Claude,
        None,
        format!("omc-{}-{}", team, worker),
        PathBuf::from("/work"),
        1_700_000_000_000,
    )
}

fn probe(outcome: ProbeOutcome) -> ProbeResult {
    ProbeResult {
        probe_result: outcome,
        probed_at: "2026-02-01T10:00:00.000Z".to_string(),
        version: 1,
    }
}

// ── Strategy selection ───────────────────────────────────────────────────

#[yare::parameterized(
    pass    = { Some(ProbeOutcome::Pass), RegistrationStrategy::Canonical },
    fail    = { Some(ProbeOutcome::Fail), RegistrationStrategy::Shadow },
    partial = { Some(ProbeOutcome::Partial), RegistrationStrategy::Shadow },
    absent  = { None, RegistrationStrategy::Shadow },
)]
fn probe_outcome_selects_strategy(outcome: Option<ProbeOutcome>, expected: RegistrationStrategy) {
    let fx = fixture();
    if let Some(outcome) = outcome {
        fx.registry.write_probe_result(&probe(outcome)).unwrap();
    }
    assert_eq!(fx.registry.registration_strategy(), expected);
}

// ── Registration ─────────────────────────────────────────────────────────

#[test]
fn register_without_probe_writes_shadow_only() {
    let fx = fixture();
    let strategy = fx.registry.register_mcp_worker("t", &member("t", "w1")).unwrap();
    assert_eq!(strategy, RegistrationStrategy::Shadow);

    assert!(fx.paths.shadow_registry_path().exists());
    assert!(!fx.paths.canonical_registry_path("t").exists());
}

#[test]
fn register_with_passing_probe_writes_both() {
    let fx = fixture();
    fx.registry.write_probe_result(&probe(ProbeOutcome::Pass)).unwrap();

    fx.registry.register_mcp_worker("t", &member("t", "w1")).unwrap();

    let canonical: serde_json::Value =
        crate::fsio::read_json(&fx.paths.canonical_registry_path("t")).unwrap().unwrap();
    let members = canonical["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["name"], "w1");
    assert_eq!(members[0]["backendType"], "tmux");
}

#[test]
fn registration_is_idempotent_per_name() {
    let fx = fixture();
    for _ in 0..3 {
        fx.registry.register_mcp_worker("t", &member("t", "w1")).unwrap();
    }
    let workers = fx.registry.list_mcp_workers("t").unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].name, "w1");
}

#[test]
fn reregistration_replaces_the_record() {
    let fx = fixture();
    fx.registry.register_mcp_worker("t", &member("t", "w1")).unwrap();

    let mut updated = member("t", "w1");
    updated.model = Some("opus".to_string());
    fx.registry.register_mcp_worker("t", &updated).unwrap();

    let workers = fx.registry.list_mcp_workers("t").unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].model.as_deref(), Some("opus"));
}

#[test]
fn canonical_update_preserves_foreign_rows_and_keys() {
    let fx = fixture();
    fx.registry.write_probe_result(&probe(ProbeOutcome::Pass)).unwrap();

    // Pre-existing canonical file owned by an external consumer.
    let path = fx.paths.canonical_registry_path("t");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        serde_json::json!({
            "schemaVersion": 3,
            "members": [
                { "name": "lead", "backendType": "in-process", "role": "lead" }
            ]
        })
        .to_string(),
    )
    .unwrap();

    fx.registry.register_mcp_worker("t", &member("t", "w1")).unwrap();

    let canonical: serde_json::Value = crate::fsio::read_json(&path).unwrap().unwrap();
    assert_eq!(canonical["schemaVersion"], 3);
    let members = canonical["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["name"], "lead");
    assert_eq!(members[0]["role"], "lead");
}

// ── Unregistration ───────────────────────────────────────────────────────

#[test]
fn unregister_removes_from_both_backs() {
    let fx = fixture();
    fx.registry.write_probe_result(&probe(ProbeOutcome::Pass)).unwrap();
    fx.registry.register_mcp_worker("t", &member("t", "w1")).unwrap();
    fx.registry.register_mcp_worker("t", &member("t", "w2")).unwrap();

    fx.registry.unregister_mcp_worker("t", "w1").unwrap();

    let workers = fx.registry.list_mcp_workers("t").unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].name, "w2");

    let canonical: serde_json::Value =
        crate::fsio::read_json(&fx.paths.canonical_registry_path("t")).unwrap().unwrap();
    let names: Vec<&str> = canonical["members"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["name"].as_str())
        .collect();
    assert_eq!(names, vec!["w2"]);
}

#[test]
fn unregister_is_scoped_to_the_team() {
    let fx = fixture();
    fx.registry.register_mcp_worker("a", &member("a", "w1")).unwrap();
    fx.registry.register_mcp_worker("b", &member("b", "w1")).unwrap();

    fx.registry.unregister_mcp_worker("a", "w1").unwrap();

    assert!(fx.registry.list_mcp_workers("a").unwrap().is_empty());
    assert_eq!(fx.registry.list_mcp_workers("b").unwrap().len(), 1);
}

// ── Merge ────────────────────────────────────────────────────────────────

#[test]
fn merge_prefers_shadow_on_name_collision() {
    let fx = fixture();
    let mut shadow_row = member("t", "w1");
    shadow_row.model = Some("shadow-model".to_string());
    fx.registry.register_mcp_worker("t", &shadow_row).unwrap();

    // Canonical carries a rival record under the same name plus an extra one.
    let path = fx.paths.canonical_registry_path("t");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut canon_dup = member("t", "w1");
    canon_dup.model = Some("canon-model".to_string());
    std::fs::write(
        &path,
        serde_json::json!({
            "members": [canon_dup, member("t", "w3")]
        })
        .to_string(),
    )
    .unwrap();

    let workers = fx.registry.list_mcp_workers("t").unwrap();
    assert_eq!(workers.len(), 2);
    let w1 = workers.iter().find(|m| m.name == "w1").unwrap();
    assert_eq!(w1.model.as_deref(), Some("shadow-model"));
    assert!(workers.iter().any(|m| m.name == "w3"));
}

#[test]
fn canonical_rows_parse_leniently() {
    let fx = fixture();
    let path = fx.paths.canonical_registry_path("t");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        serde_json::json!({
            "members": [
                { "name": "lead", "backendType": "in-process", "quirk": true },
                { "notAName": 1 }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let rows = fx.registry.list_canonical_members("t").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "lead");
    assert_eq!(rows[0].backend_type, "in-process");
    assert_eq!(rows[0].extra["quirk"], true);
}
