// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

fn record() -> MemberRecord {
    MemberRecord::new(
        "alpha",
        "w1",
        Provider::Claude,
        Some("sonnet".to_string()),
        "omc-alpha-w1".to_string(),
        PathBuf::from("/work/alpha/w1"),
        1_700_000_000_000,
    )
}

#[test]
fn agent_id_is_worker_at_team() {
    let member = record();
    assert_eq!(member.agent_id, "w1@alpha");
    assert_eq!(member.team_name(), Some("alpha"));
}

#[test]
fn new_records_are_tmux_backed() {
    let member = record();
    assert!(member.is_mcp_worker());
    assert_eq!(member.backend_type, BACKEND_TMUX);
    assert_eq!(member.provider(), Some(Provider::Claude));
}

#[test]
fn foreign_backend_is_not_mcp() {
    let mut member = record();
    member.backend_type = "in-process".to_string();
    assert!(!member.is_mcp_worker());
}

#[yare::parameterized(
    claude = { Provider::Claude, "mcp-claude" },
    codex  = { Provider::Codex, "mcp-codex" },
)]
fn agent_type_round_trips(provider: Provider, agent_type: &str) {
    assert_eq!(provider.agent_type(), agent_type);
    assert_eq!(Provider::from_agent_type(agent_type), Some(provider));
}

#[test]
fn unknown_agent_type_has_no_provider() {
    assert_eq!(Provider::from_agent_type("claude-native"), None);
}

#[test]
fn wire_format_uses_camel_case() {
    let json: serde_json::Value = serde_json::to_value(record()).unwrap();
    assert_eq!(json["agentId"], "w1@alpha");
    assert_eq!(json["agentType"], "mcp-claude");
    assert_eq!(json["backendType"], "tmux");
    assert_eq!(json["joinedAt"], 1_700_000_000_000u64);
    assert_eq!(json["sessionId"], "omc-alpha-w1");
    assert_eq!(json["subscriptions"], serde_json::json!([]));
}
