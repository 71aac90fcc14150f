//! Prompt assembly — system preambles, the tool manifest, and the
//! per-iteration extra messages.
//!
//! The tool manifest is rendered from the registry's `ToolDefinition`s,
//! the single source of truth; the rendering format is pluggable but the
//! underlying metadata never forks.
//!
//! ExtraMessages are **derived state**: rebuilt from scratch every
//! iteration out of the current turn's results, the latest policy
//! decision, and at most one pending corrective prompt. Nothing here is
//! appended across iterations, so a corrective prompt from iteration two
//! cannot still haunt iteration ten.

use serde::{Deserialize, Serialize};

use hearthloop_core::{Message, ResearchPhase, SessionMode, ToolDefinition, ToolKind, ToolResult};

use crate::compactor::Compactor;
use crate::policy::Rejection;

/// How the tool manifest is rendered into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStyle {
    /// Full descriptions and parameter schemas.
    #[default]
    Verbose,
    /// One signature line per tool.
    Compact,
    /// Machine-readable JSON call definitions.
    CallDefinitions,
}

/// Render the manifest for the given definitions.
pub fn render_manifest(definitions: &[ToolDefinition], style: ManifestStyle) -> String {
    if definitions.is_empty() {
        return String::new();
    }

    match style {
        ManifestStyle::Verbose => {
            let mut out = String::from("## Available tools\n");
            for def in definitions {
                out.push_str(&format!("### {}\n{}\n", def.name, def.description));
                out.push_str(&format!("Parameters: {}\n", def.parameters));
            }
            out
        }
        ManifestStyle::Compact => {
            let mut out = String::from("Tools: ");
            let sigs: Vec<String> = definitions
                .iter()
                .map(|def| format!("{}({})", def.name, parameter_names(def).join(", ")))
                .collect();
            out.push_str(&sigs.join("; "));
            out.push('\n');
            out
        }
        ManifestStyle::CallDefinitions => {
            // Serialization of plain data cannot fail; fall back to empty
            // rather than plumb an error through prompt assembly.
            serde_json::to_string_pretty(definitions).unwrap_or_default()
        }
    }
}

fn parameter_names(def: &ToolDefinition) -> Vec<String> {
    def.parameters
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

/// The mode- and phase-specific system preamble.
pub fn system_preamble(mode: SessionMode, phase: Option<ResearchPhase>) -> String {
    match mode {
        SessionMode::QuickLookup => "You are a personal assistant answering a quick question. \
            Use at most two tool calls, then answer directly and concisely. \
            Never announce a tool call without making it."
            .into(),
        SessionMode::Ingest => "You are recording something the user wants remembered. \
            Call the memory_write tool exactly once with the right namespace and content, \
            then confirm briefly to the user."
            .into(),
        SessionMode::Research => match phase.unwrap_or(ResearchPhase::Planning) {
            ResearchPhase::Planning => "You are a research assistant. First produce a short \
                numbered plan inside <plan>...</plan> describing what you will look up, \
                then begin executing it with tool calls."
                .into(),
            ResearchPhase::Execution => "You are executing your research plan. Gather evidence \
                from distinct sources using the available tools. Do not write the final \
                answer yet."
                .into(),
            ResearchPhase::Synthesis => format!(
                "You have gathered enough sources. Write your final report now with these \
                 sections, each non-empty:\n{}",
                SYNTHESIS_MARKERS
                    .iter()
                    .map(|m| format!("  {m}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        },
    }
}

/// The four section markers a completed synthesis must carry.
pub const SYNTHESIS_MARKERS: [&str; 4] = ["Plan:", "Synthesis:", "Confidence:", "Gaps:"];

/// Build this iteration's extra messages from current authoritative state.
pub fn build_extra_messages(
    compactor: &Compactor,
    kind_of: impl Fn(&str) -> ToolKind,
    turn_results: &[ToolResult],
    rejections: &[Rejection],
    corrective: Option<&str>,
) -> Vec<Message> {
    let mut extra = Vec::new();

    let (tail, digest) = compactor.compact(turn_results, kind_of);
    if let Some(digest) = digest {
        extra.push(Message::tool(digest));
    }
    for result in tail {
        extra.push(Message::tool(render_result(result)));
    }

    for rejection in rejections {
        extra.push(Message::system(format!(
            "Tool call denied: {} — {}. Adjust your approach.",
            rejection.tool, rejection.reason
        )));
    }

    if let Some(corrective) = corrective {
        extra.push(Message::system(corrective.to_string()));
    }

    extra
}

/// Echo one tool result (call plus outcome) for the model.
fn render_result(result: &ToolResult) -> String {
    match result.error() {
        Some(error) => format!("[{}] failed: {}", result.tool, error),
        None => format!("[{}] {}\n{}", result.tool, result.summary, result.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "web_search".into(),
                description: "Search the web".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}}
                }),
                kind: ToolKind::Search,
            },
            ToolDefinition {
                name: "web_fetch".into(),
                description: "Fetch a page".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {"url": {"type": "string"}}
                }),
                kind: ToolKind::Fetch,
            },
        ]
    }

    #[test]
    fn verbose_manifest_lists_descriptions() {
        let rendered = render_manifest(&defs(), ManifestStyle::Verbose);
        assert!(rendered.contains("### web_search"));
        assert!(rendered.contains("Search the web"));
        assert!(rendered.contains("Parameters:"));
    }

    #[test]
    fn compact_manifest_is_signature_only() {
        let rendered = render_manifest(&defs(), ManifestStyle::Compact);
        assert!(rendered.contains("web_search(query)"));
        assert!(rendered.contains("web_fetch(url)"));
        assert!(!rendered.contains("Search the web"));
    }

    #[test]
    fn call_definitions_manifest_is_json() {
        let rendered = render_manifest(&defs(), ManifestStyle::CallDefinitions);
        let parsed: Vec<ToolDefinition> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn empty_definitions_render_nothing() {
        assert!(render_manifest(&[], ManifestStyle::Verbose).is_empty());
    }

    #[test]
    fn synthesis_preamble_names_all_markers() {
        let preamble = system_preamble(SessionMode::Research, Some(ResearchPhase::Synthesis));
        for marker in SYNTHESIS_MARKERS {
            assert!(preamble.contains(marker), "missing {marker}");
        }
    }

    #[test]
    fn extra_messages_rebuilt_from_inputs_only() {
        let compactor = Compactor::new(8, 3);
        let results = vec![ToolResult::ok("web_search", "ok", "hits")];
        let rejections = vec![Rejection {
            tool: "web_fetch".into(),
            reason: "argument 'url' contains a forbidden pattern (path traversal)".into(),
            sanitized_args: None,
        }];

        let extra = build_extra_messages(&compactor, |_| ToolKind::Search, &results, &rejections, Some("continue"));
        assert_eq!(extra.len(), 3);
        assert!(extra[0].content.contains("[web_search]"));
        assert!(extra[1].content.contains("denied"));
        assert_eq!(extra[2].content, "continue");

        // Same inputs, same output: nothing accumulates across calls.
        let again = build_extra_messages(&compactor, |_| ToolKind::Search, &results, &rejections, Some("continue"));
        assert_eq!(again.len(), extra.len());

        // Dropping the corrective drops its message.
        let without = build_extra_messages(&compactor, |_| ToolKind::Search, &results, &rejections, None);
        assert_eq!(without.len(), 2);
    }

    #[test]
    fn failed_results_echo_the_error() {
        let compactor = Compactor::new(8, 3);
        let results = vec![ToolResult::failed("web_fetch", "cache miss")];
        let extra = build_extra_messages(&compactor, |_| ToolKind::Fetch, &results, &[], None);
        assert!(extra[0].content.contains("failed: cache miss"));
    }
}
