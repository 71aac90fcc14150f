//! Research phase tracker — authoritative state for a Research-mode turn.
//!
//! Exactly one instance exists per turn, and **every** code path that
//! executes a tool reports into it through [`ResearchTracker::record_result`].
//! The parallel batch path and the sequential path call the same method on
//! the same instance; neither carries its own counting logic. An earlier
//! revision duplicated the increment/insert logic at both dispatch sites
//! and the two copies drifted until source counts disagreed.
//!
//! Path counters exist for observability only. Tracking is identical no
//! matter which path produced a record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use hearthloop_core::{ResearchPhase, ToolKind, ToolResult};

/// Which dispatch route executed a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPath {
    /// Part of a concurrent batch (more than one approved proposal).
    Batch,
    /// Executed alone.
    Individual,
}

/// Per-path record counts, observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCounters {
    pub batch: usize,
    pub individual: usize,
}

/// Mutable state for one Research-mode turn. Created at mode entry,
/// discarded at turn end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTracker {
    /// Whether the model has produced a plan this turn
    pub plan_accepted: bool,

    /// The accepted plan text (empty until accepted)
    pub plan_text: String,

    /// Whether the synthesis prompt has been issued
    pub synthesis_triggered: bool,

    /// Total tool calls recorded
    pub tool_call_count: usize,

    /// Search-type calls recorded
    pub search_count: usize,

    /// First-time fetches of distinct sources
    pub fetch_count: usize,

    /// Normalized source identifiers seen so far
    pub distinct_source_ids: BTreeSet<String>,

    /// Search queries in issue order
    pub search_queries: Vec<String>,

    /// Which dispatch path produced each record
    pub path_counters: PathCounters,
}

/// Sources required before synthesis is prompted.
const SYNTHESIS_SOURCE_THRESHOLD: usize = 3;

impl ResearchTracker {
    pub fn new() -> Self {
        Self {
            plan_accepted: false,
            plan_text: String::new(),
            synthesis_triggered: false,
            tool_call_count: 0,
            search_count: 0,
            fetch_count: 0,
            distinct_source_ids: BTreeSet::new(),
            search_queries: Vec::new(),
            path_counters: PathCounters::default(),
        }
    }

    /// Accept the model's plan. Later plans replace the text but the
    /// accepted flag never unsets within a turn.
    pub fn accept_plan(&mut self, plan: &str) {
        self.plan_accepted = true;
        self.plan_text = plan.to_string();
        debug!(plan_len = plan.len(), "Research plan accepted");
    }

    /// The single entry point for recording an executed tool call.
    /// Both dispatch paths call this and nothing else.
    pub fn record_result(
        &mut self,
        kind: ToolKind,
        result: &ToolResult,
        args: &serde_json::Map<String, serde_json::Value>,
        path: DispatchPath,
    ) {
        self.tool_call_count += 1;
        match path {
            DispatchPath::Batch => self.path_counters.batch += 1,
            DispatchPath::Individual => self.path_counters.individual += 1,
        }

        match kind {
            ToolKind::Search => {
                self.search_count += 1;
                if let Some(query) = args.get("query").and_then(|v| v.as_str()) {
                    self.search_queries.push(query.to_string());
                }
            }
            ToolKind::Fetch => {
                // Prefer the identifier the tool reports; fall back to the
                // requested URL. Failed fetches don't count as sources.
                if result.is_error() {
                    return;
                }
                let raw = result
                    .source_id()
                    .or_else(|| args.get("url").and_then(|v| v.as_str()));
                if let Some(raw) = raw {
                    let normalized = normalize_source_id(raw);
                    if self.distinct_source_ids.insert(normalized) {
                        self.fetch_count += 1;
                    }
                }
            }
            _ => {}
        }
    }

    /// Whether the controller should issue the synthesis prompt now.
    pub fn should_trigger_synthesis(&self) -> bool {
        self.plan_accepted
            && self.distinct_source_ids.len() >= SYNTHESIS_SOURCE_THRESHOLD
            && !self.synthesis_triggered
    }

    /// Record that the synthesis prompt has been issued.
    pub fn mark_synthesis_triggered(&mut self) {
        self.synthesis_triggered = true;
    }

    /// Current phase, derived purely from the two booleans.
    pub fn phase(&self) -> ResearchPhase {
        match (self.plan_accepted, self.synthesis_triggered) {
            (false, _) => ResearchPhase::Planning,
            (true, false) => ResearchPhase::Execution,
            (true, true) => ResearchPhase::Synthesis,
        }
    }
}

impl Default for ResearchTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a source identifier: strip the URL fragment and any trailing
/// slash so `https://a.example/p/`, `https://a.example/p#intro`, and
/// `https://a.example/p` all count as one source.
pub fn normalize_source_id(raw: &str) -> String {
    let without_fragment = raw.split('#').next().unwrap_or(raw);
    without_fragment.trim_end_matches('/').to_string()
}
