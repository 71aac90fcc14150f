//! Shared test helpers: scripted providers and stub tools.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use hearthloop_core::error::ProviderError;
use hearthloop_core::{
    ChatRequest, ChatResponse, InferenceProvider, SessionMode, Tool, ToolKind, ToolRegistry,
    ToolRequest, ToolResult, Usage,
};

/// A mock provider that returns a sequence of scripted texts.
///
/// Each call to `chat` returns the next text in the queue; when the queue
/// runs out, the last text repeats (convenient for iteration-ceiling
/// tests). Every request is recorded for inspection.
pub struct SequentialMockProvider {
    responses: Vec<String>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        assert!(!responses.is_empty(), "need at least one scripted response");
        Self {
            responses: responses.into_iter().map(String::from).collect(),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that always returns the same text.
    pub fn repeating(text: &str) -> Self {
        Self::new(vec![text])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// All requests seen so far, for asserting on prompt contents.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceProvider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut count = self.call_count.lock().unwrap();
        let index = (*count).min(self.responses.len() - 1);
        *count += 1;
        Ok(ChatResponse {
            text: self.responses[index].clone(),
            model: "mock-model".into(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}

/// A provider that fails a fixed number of times before succeeding.
pub struct FlakyProvider {
    failures_left: Mutex<usize>,
    text: String,
}

impl FlakyProvider {
    pub fn new(failures: usize, text: &str) -> Self {
        Self {
            failures_left: Mutex::new(failures),
            text: text.into(),
        }
    }
}

#[async_trait]
impl InferenceProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky_mock"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut left = self.failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(ProviderError::Network("connection reset".into()));
        }
        Ok(ChatResponse {
            text: self.text.clone(),
            model: "mock-model".into(),
            usage: None,
        })
    }
}

// ── Stub tools ────────────────────────────────────────────────────────────

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }
    fn description(&self) -> &str {
        "Search the web for a query"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "max_results": {"type": "integer"}
            },
            "required": ["query"]
        })
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }
    async fn run(&self, request: ToolRequest) -> ToolResult {
        let query = request.str_arg("query").unwrap_or("").to_string();
        ToolResult::ok("web_search", format!("results for '{query}'"), "1. https://a.example\n2. https://b.example")
    }
}

pub struct FetchTool;

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }
    fn description(&self) -> &str {
        "Fetch the content of a URL"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"url": {"type": "string"}},
            "required": ["url"]
        })
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Fetch
    }
    async fn run(&self, request: ToolRequest) -> ToolResult {
        let url = request.str_arg("url").unwrap_or("").to_string();
        ToolResult::ok("web_fetch", format!("fetched {url}"), "page body")
            .with_meta("source_id", serde_json::json!(url))
    }
}

pub struct MemoryReadTool;

#[async_trait]
impl Tool for MemoryReadTool {
    fn name(&self) -> &str {
        "memory_read"
    }
    fn description(&self) -> &str {
        "Look up stored memories"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }
    fn kind(&self) -> ToolKind {
        ToolKind::MemoryRead
    }
    async fn run(&self, _request: ToolRequest) -> ToolResult {
        ToolResult::ok("memory_read", "1 memory found", "User prefers metric units")
    }
}

pub struct MemoryWriteTool;

#[async_trait]
impl Tool for MemoryWriteTool {
    fn name(&self) -> &str {
        "memory_write"
    }
    fn description(&self) -> &str {
        "Store a memory in a namespace"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["namespace", "content"]
        })
    }
    fn kind(&self) -> ToolKind {
        ToolKind::MemoryWrite
    }
    fn available_in(&self, mode: SessionMode) -> bool {
        mode == SessionMode::Ingest
    }
    async fn run(&self, request: ToolRequest) -> ToolResult {
        let namespace = request.str_arg("namespace").unwrap_or("?");
        ToolResult::ok("memory_write", format!("stored in '{namespace}'"), "")
    }
}

/// A tool that sleeps before answering, for ordering tests.
pub struct SlowTool {
    name: String,
    delay_ms: u64,
}

impl SlowTool {
    pub fn new(name: &str, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            delay_ms,
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Echoes slowly"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Other
    }
    async fn run(&self, request: ToolRequest) -> ToolResult {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        let text = request.str_arg("text").unwrap_or("").to_string();
        ToolResult::ok(self.name.clone(), "echoed", text)
    }
}

/// A tool that always fails, for isolation tests.
pub struct FailingTool {
    name: String,
    reason: String,
}

impl FailingTool {
    pub fn new(name: &str, reason: &str) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Fetch
    }
    async fn run(&self, _request: ToolRequest) -> ToolResult {
        ToolResult::failed(self.name.clone(), self.reason.clone())
    }
}

/// The registry most tests run against: search, fetch, and memory tools.
pub fn standard_test_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchTool));
    registry.register(Box::new(FetchTool));
    registry.register(Box::new(MemoryReadTool));
    registry.register(Box::new(MemoryWriteTool));
    registry
}
