//! Tool-call parser chain — extracting structured proposals from raw text.
//!
//! Models emit tool calls in different wire formats. Two are supported in
//! every deployment:
//!
//! - **Structured tag**:
//!   `<tool_call><function=NAME><parameter=KEY>VALUE</parameter>...</function></tool_call>`
//! - **Structured object**:
//!   `{"plan": "...", "tool_calls": [{"tool": "NAME", "args": {...}}]}`
//!
//! Which format is tried first is per-model configuration. The first format
//! that yields at least one syntactically valid proposal wins; the other is
//! not attempted. Unknown formats or no match yield an empty list, never an
//! error — "nothing parsed" is a normal loop outcome, not a fault.

pub mod object;
pub mod repair;
pub mod tag;

use serde::{Deserialize, Serialize};

use hearthloop_config::ParserOrder;

pub use object::ObjectParser;
pub use repair::repair_truncated_tags;
pub use tag::TagParser;

/// Which wire format produced a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    Tag,
    Object,
}

/// A parsed, not-yet-validated request to invoke a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolProposal {
    /// Tool name as emitted by the model
    pub tool: String,

    /// Argument map as emitted by the model
    pub args: serde_json::Map<String, serde_json::Value>,

    /// Which parser produced this proposal
    pub provenance: WireFormat,
}

/// A single wire-format parser.
pub trait ProposalParser: Send + Sync {
    /// Extract proposals from model text. Empty means "this format did
    /// not match"; parsers never error.
    fn parse(&self, text: &str) -> Vec<ToolProposal>;
}

/// Ordered chain of wire-format parsers.
pub struct ParserChain {
    order: ParserOrder,
    tag: TagParser,
    object: ObjectParser,
}

impl ParserChain {
    pub fn new(order: ParserOrder) -> Self {
        Self {
            order,
            tag: TagParser,
            object: ObjectParser,
        }
    }

    /// Run the chain. The first format that yields at least one proposal
    /// wins; later formats are not attempted.
    pub fn parse(&self, text: &str) -> Vec<ToolProposal> {
        let parsers: [&dyn ProposalParser; 2] = match self.order {
            ParserOrder::TagFirst => [&self.tag, &self.object],
            ParserOrder::ObjectFirst => [&self.object, &self.tag],
        };

        for parser in parsers {
            let proposals = parser.parse(text);
            if !proposals.is_empty() {
                return proposals;
            }
        }
        Vec::new()
    }
}

/// Extract a research plan from model text, if one is declared.
///
/// Either a `<plan>...</plan>` tag or the `"plan"` field of the structured
/// object counts. Empty plan bodies are ignored.
pub fn extract_plan(text: &str) -> Option<String> {
    if let Some(start) = text.find("<plan>") {
        let rest = &text[start + "<plan>".len()..];
        if let Some(end) = rest.find("</plan>") {
            let body = rest[..end].trim();
            if !body.is_empty() {
                return Some(body.to_string());
            }
        }
    }

    if let Some(obj) = object::find_json_object(text) {
        if let Some(plan) = obj.get("plan").and_then(|v| v.as_str()) {
            let plan = plan.trim();
            if !plan.is_empty() {
                return Some(plan.to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG_TEXT: &str = "I'll search for that.\n<tool_call><function=web_search><parameter=query>rust async runtimes</parameter></function></tool_call>";
    const OBJECT_TEXT: &str = r#"{"plan": "look it up", "tool_calls": [{"tool": "web_search", "args": {"query": "rust async runtimes"}}]}"#;

    #[test]
    fn tag_first_prefers_tag_format() {
        let chain = ParserChain::new(ParserOrder::TagFirst);
        let proposals = chain.parse(TAG_TEXT);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].provenance, WireFormat::Tag);
    }

    #[test]
    fn chain_falls_through_to_object() {
        let chain = ParserChain::new(ParserOrder::TagFirst);
        let proposals = chain.parse(OBJECT_TEXT);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].provenance, WireFormat::Object);
        assert_eq!(proposals[0].tool, "web_search");
    }

    #[test]
    fn first_matching_format_wins() {
        // Text containing both formats: with ObjectFirst, the object parser
        // claims it and the tag parser is never consulted.
        let both = format!("{OBJECT_TEXT}\n{TAG_TEXT}");
        let chain = ParserChain::new(ParserOrder::ObjectFirst);
        let proposals = chain.parse(&both);
        assert!(proposals.iter().all(|p| p.provenance == WireFormat::Object));
    }

    #[test]
    fn garbage_yields_empty_not_error() {
        let chain = ParserChain::new(ParserOrder::TagFirst);
        assert!(chain.parse("just prose, no calls").is_empty());
        assert!(chain.parse("<tool_call>mangled").is_empty());
        assert!(chain.parse("{\"tool_calls\": \"not a list\"}").is_empty());
    }

    #[test]
    fn plan_extracted_from_tag() {
        let plan = extract_plan("<plan>1. search\n2. fetch\n3. synthesize</plan>");
        assert_eq!(plan.as_deref(), Some("1. search\n2. fetch\n3. synthesize"));
    }

    #[test]
    fn plan_extracted_from_object() {
        let plan = extract_plan(OBJECT_TEXT);
        assert_eq!(plan.as_deref(), Some("look it up"));
    }

    #[test]
    fn empty_plan_body_ignored() {
        assert!(extract_plan("<plan>   </plan>").is_none());
        assert!(extract_plan(r#"{"plan": "", "tool_calls": []}"#).is_none());
    }
}
