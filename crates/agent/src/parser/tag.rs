//! Structured-tag wire format.
//!
//! ```text
//! <tool_call>
//!   <function=web_search>
//!     <parameter=query>rust async runtimes</parameter>
//!     <parameter=max_results>5</parameter>
//!   </function>
//! </tool_call>
//! ```
//!
//! Parameter values that parse as JSON scalars/containers are kept typed
//! (`5` stays a number); everything else is a string. A block that cannot
//! be parsed is skipped — one mangled call does not poison its siblings.

use super::{ProposalParser, ToolProposal, WireFormat};

pub struct TagParser;

impl ProposalParser for TagParser {
    fn parse(&self, text: &str) -> Vec<ToolProposal> {
        let mut proposals = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find("<tool_call>") {
            let after = &rest[start + "<tool_call>".len()..];
            let Some(end) = after.find("</tool_call>") else {
                break;
            };
            if let Some(proposal) = parse_block(&after[..end]) {
                proposals.push(proposal);
            }
            rest = &after[end + "</tool_call>".len()..];
        }

        proposals
    }
}

/// Parse the inside of one `<tool_call>` block.
fn parse_block(block: &str) -> Option<ToolProposal> {
    let fn_start = block.find("<function=")?;
    let after_fn = &block[fn_start + "<function=".len()..];
    let name_end = after_fn.find('>')?;
    let name = after_fn[..name_end].trim();
    if name.is_empty() || !is_valid_name(name) {
        return None;
    }

    let body_end = after_fn.find("</function>").unwrap_or(after_fn.len());
    let body = &after_fn[name_end + 1..body_end];

    let mut args = serde_json::Map::new();
    let mut rest = body;
    while let Some(p_start) = rest.find("<parameter=") {
        let after_p = &rest[p_start + "<parameter=".len()..];
        let key_end = after_p.find('>')?;
        let key = after_p[..key_end].trim();
        let after_key = &after_p[key_end + 1..];
        let val_end = after_key.find("</parameter>")?;
        let raw = after_key[..val_end].trim();

        if !key.is_empty() {
            args.insert(key.to_string(), coerce_value(raw));
        }
        rest = &after_key[val_end + "</parameter>".len()..];
    }

    Some(ToolProposal {
        tool: name.to_string(),
        args,
        provenance: WireFormat::Tag,
    })
}

/// Tool names are identifier-like; anything with markup is a parse artifact.
fn is_valid_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Keep JSON-typed values typed, fall back to string.
fn coerce_value(raw: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(v) if !v.is_string() => v,
        _ => serde_json::Value::String(raw.to_string()),
    }
}
