// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude CLI: structured line-delimited JSON output.

use super::cap_response;

/// Argv for a one-shot prompt with streamed structured output.
pub(super) fn command(model: Option<&str>) -> (String, Vec<String>) {
    let mut args = vec![
        "-p".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
    ];
    if let Some(model) = model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }
    ("claude".to_string(), args)
}

/// Extract the textual response from a stream-JSON transcript.
///
/// Recognised events: `assistant` messages contribute their `text` content
/// blocks; a final `result` event is the fallback when no assistant text
/// was seen. Unparseable lines are skipped. The result is capped at the
/// response limit with a truncation marker.
pub fn extract_stream_response(stdout: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut result_fallback: Option<String> = None;

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(event) = serde_json::from_str::<serde_json::Value>(trimmed) else {
            continue;
        };

        match event.get("type").and_then(|v| v.as_str()) {
            Some("assistant") => {
                let blocks = event
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(|c| c.as_array());
                let Some(blocks) = blocks else { continue };
                for block in blocks {
                    if block.get("type").and_then(|v| v.as_str()) == Some("text") {
                        if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                            parts.push(text.to_string());
                        }
                    }
                }
            }
            Some("result") => {
                if let Some(text) = event.get("result").and_then(|v| v.as_str()) {
                    result_fallback = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let text = if parts.is_empty() {
        result_fallback.unwrap_or_default()
    } else {
        parts.join("\n")
    };
    cap_response(text)
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
