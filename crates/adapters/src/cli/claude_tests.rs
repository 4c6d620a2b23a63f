// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn command_requests_structured_output_on_stdin() {
    let (program, args) = command(None);
    assert_eq!(program, "claude");
    assert_eq!(args, vec!["-p", "--output-format", "stream-json", "--verbose"]);

    let (_, with_model) = command(Some("opus"));
    assert!(with_model.ends_with(&["--model".to_string(), "opus".to_string()]));
}

#[yare::parameterized(
    single_text = {
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Done."}]}}"#,
        "Done."
    },
    skips_tool_use = {
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash"},{"type":"text","text":"Ran it"}]}}"#,
        "Ran it"
    },
    result_fallback = {
        r#"{"type":"result","subtype":"success","result":"From result"}"#,
        "From result"
    },
    skips_system_events = {
        "{\"type\":\"system\",\"subtype\":\"init\"}\n{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"ok\"}]}}",
        "ok"
    },
    skips_garbage_lines = {
        "not json at all\n{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"ok\"}]}}",
        "ok"
    },
    empty_stream = { "", "" },
)]
fn stream_extraction(stdout: &str, expected: &str) {
    assert_eq!(extract_stream_response(stdout), expected);
}

#[test]
fn assistant_text_wins_over_result() {
    let stdout = concat!(
        "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"body\"}]}}\n",
        "{\"type\":\"result\",\"subtype\":\"success\",\"result\":\"summary\"}\n",
    );
    assert_eq!(extract_stream_response(stdout), "body");
}

#[test]
fn multiple_assistant_messages_concatenate() {
    let stdout = concat!(
        "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"one\"}]}}\n",
        "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"two\"}]}}\n",
    );
    assert_eq!(extract_stream_response(stdout), "one\ntwo");
}

#[test]
fn oversized_response_is_capped_with_marker() {
    let big = "y".repeat(super::super::RESPONSE_CAP_BYTES + 100);
    let line = serde_json::json!({
        "type": "assistant",
        "message": { "content": [ { "type": "text", "text": big } ] }
    })
    .to_string();

    let extracted = extract_stream_response(&line);
    assert!(extracted.ends_with(super::super::TRUNCATION_MARKER));
}
