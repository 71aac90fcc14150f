//! Tool trait — the abstraction over assistant capabilities.
//!
//! Tools are what let the assistant act: search the web, fetch a page,
//! read or write long-term memory. The turn controller never talks to a
//! concrete tool; it goes through the [`ToolRegistry`].
//!
//! ## The result contract
//!
//! `ToolResult` construction can never fail and execution can never raise.
//! Every failure mode — timeout, cache miss, bad arguments, unknown tool —
//! is expressed as an entry in the always-present `metadata` map. An earlier
//! design carried an optional error field on a strict result type; a cache
//! miss that skipped the field crashed the loop. The metadata map makes that
//! state unrepresentable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::mode::SessionMode;

/// Classification of a tool, used by the research tracker and the
/// context compactor to group results without knowing concrete tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Issues a query and returns candidate sources (e.g. web search).
    Search,
    /// Retrieves the content of one identified source (e.g. page fetch).
    Fetch,
    /// Reads from long-term memory.
    MemoryRead,
    /// Writes to long-term memory.
    MemoryWrite,
    /// Anything else.
    Other,
}

impl ToolKind {
    /// Stable label used in digests and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Search => "search",
            ToolKind::Fetch => "fetch",
            ToolKind::MemoryRead => "memory_read",
            ToolKind::MemoryWrite => "memory_write",
            ToolKind::Other => "other",
        }
    }
}

/// A validated request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Name of the tool to execute
    pub tool: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Map<String, serde_json::Value>,

    /// The mode of the session issuing the request
    pub session_mode: SessionMode,
}

impl ToolRequest {
    /// Convenience accessor for a string argument.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// The result of a tool execution. Construction is infallible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool that produced this result
    pub tool: String,

    /// One-line human-readable summary
    pub summary: String,

    /// The content payload (may be empty on failure)
    pub content: String,

    /// Always-present metadata map. Failures live here under `"error"`;
    /// fetch tools report the normalized source under `"source_id"`.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(tool: impl Into<String>, summary: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            summary: summary.into(),
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// A failed result. The error lives in metadata, never in the shape.
    pub fn failed(tool: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        let mut metadata = serde_json::Map::new();
        metadata.insert("error".into(), serde_json::Value::String(error.clone()));
        Self {
            tool: tool.into(),
            summary: format!("error: {error}"),
            content: String::new(),
            metadata,
        }
    }

    /// Attach a metadata entry, builder-style.
    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether this result carries an error entry.
    pub fn is_error(&self) -> bool {
        self.metadata.contains_key("error")
    }

    /// The error message, if any.
    pub fn error(&self) -> Option<&str> {
        self.metadata.get("error").and_then(|v| v.as_str())
    }

    /// The source identifier reported by a fetch-type tool, if any.
    pub fn source_id(&self) -> Option<&str> {
        self.metadata.get("source_id").and_then(|v| v.as_str())
    }
}

/// A tool definition sent to the model so it knows what it can call.
/// This is the single source of truth the manifest renderers draw from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,

    /// Classification
    pub kind: ToolKind,
}

/// The core Tool trait.
///
/// Each tool (web_search, web_fetch, memory_read, memory_write, ...)
/// implements this trait. Tools are registered in the ToolRegistry and
/// offered to the model according to session mode.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "web_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Classification for tracking and compaction.
    fn kind(&self) -> ToolKind;

    /// Whether this tool is offered in the given session mode.
    /// Default: offered everywhere.
    fn available_in(&self, _mode: SessionMode) -> bool {
        true
    }

    /// Execute the tool. Infallible by contract: failures are expressed
    /// in the returned result's metadata.
    async fn run(&self, request: ToolRequest) -> ToolResult;

    /// Convert this tool into a ToolDefinition for the manifest.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
            kind: self.kind(),
        }
    }
}

/// A registry of available tools.
///
/// The turn controller uses this to:
/// 1. Get tool definitions for the manifest (filtered by mode)
/// 2. Dispatch approved proposals to the owning tool
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// The kind of a registered tool, if present.
    pub fn kind_of(&self, name: &str) -> Option<ToolKind> {
        self.tools.get(name).map(|t| t.kind())
    }

    /// Tool definitions offered in the given mode, sorted by name so the
    /// rendered manifest is stable across runs.
    pub fn definitions_for(&self, mode: SessionMode) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| t.available_in(mode))
            .map(|t| t.to_definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool request. Never raises: an unknown tool yields an
    /// error-carrying result like any other failure.
    pub async fn run(&self, request: ToolRequest) -> ToolResult {
        match self.tools.get(&request.tool) {
            Some(tool) => tool.run(request).await,
            None => ToolResult::failed(&request.tool, format!("unknown tool '{}'", request.tool)),
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
