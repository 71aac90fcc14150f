//! Structured-object wire format.
//!
//! ```json
//! {"plan": "...", "tool_calls": [{"tool": "web_search", "args": {"query": "..."}}]}
//! ```
//!
//! The object may be bare or wrapped in a fenced code block; prose before
//! and after is tolerated. A `tool_calls` entry missing its `tool` name is
//! skipped, not fatal.

use super::{ProposalParser, ToolProposal, WireFormat};

pub struct ObjectParser;

impl ProposalParser for ObjectParser {
    fn parse(&self, text: &str) -> Vec<ToolProposal> {
        let Some(obj) = find_json_object(text) else {
            return Vec::new();
        };
        let Some(calls) = obj.get("tool_calls").and_then(|v| v.as_array()) else {
            return Vec::new();
        };

        calls
            .iter()
            .filter_map(|call| {
                let tool = call.get("tool").and_then(|v| v.as_str())?.trim();
                if tool.is_empty() {
                    return None;
                }
                let args = call
                    .get("args")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                Some(ToolProposal {
                    tool: tool.to_string(),
                    args,
                    provenance: WireFormat::Object,
                })
            })
            .collect()
    }
}

/// Locate and parse the first balanced JSON object in free-form text.
///
/// Scans from each `{` and tracks brace depth, honoring string literals and
/// escapes, so `{"q": "a } b"}` parses correctly.
pub(crate) fn find_json_object(text: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let bytes = text.as_bytes();
    let mut start = 0;

    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(end) = balanced_end(bytes, open) {
            if let Ok(serde_json::Value::Object(map)) =
                serde_json::from_str::<serde_json::Value>(&text[open..=end])
            {
                return Some(map);
            }
        }
        start = open + 1;
    }
    None
}

/// Index of the `}` closing the object opened at `open`, if balanced.
fn balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
