//! Tool dispatch — executing approved proposals.
//!
//! A single approved proposal runs on the individual path. More than one
//! runs concurrently through a bounded pool (`buffered`, small fixed
//! width), and all results are joined before the loop resumes. Result
//! order always matches proposal order.
//!
//! One call failing never cancels or corrupts its siblings: the registry
//! returns an error-carrying `ToolResult` for that slot and the others
//! proceed.
//!
//! Whatever the path, every result is reported to the research tracker
//! through its one `record_result` entry point. No counting logic lives
//! here.

use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::debug;

use hearthloop_core::{SessionMode, ToolKind, ToolRegistry, ToolRequest, ToolResult};

use crate::parser::ToolProposal;
use crate::tracker::{DispatchPath, ResearchTracker};

/// Executes approved proposals against the registry.
pub struct ToolDispatcher {
    /// Concurrent batch width
    width: usize,
}

impl ToolDispatcher {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }

    /// Run the approved proposals and record each result into the tracker
    /// (when one is active, i.e. Research mode).
    pub async fn dispatch(
        &self,
        registry: &ToolRegistry,
        mode: SessionMode,
        proposals: &[ToolProposal],
        tracker: Option<&mut ResearchTracker>,
    ) -> Vec<ToolResult> {
        if proposals.is_empty() {
            return Vec::new();
        }

        let path = if proposals.len() > 1 {
            DispatchPath::Batch
        } else {
            DispatchPath::Individual
        };

        let started = Instant::now();
        let mut results: Vec<ToolResult> = stream::iter(proposals.iter().map(|proposal| {
            let request = ToolRequest {
                tool: proposal.tool.clone(),
                arguments: proposal.args.clone(),
                session_mode: mode,
            };
            async move {
                let call_start = Instant::now();
                let result = registry.run(request).await;
                debug!(
                    tool = %result.tool,
                    error = result.is_error(),
                    duration_ms = call_start.elapsed().as_millis() as u64,
                    "Tool call finished"
                );
                result
            }
        }))
        .buffered(self.width)
        .collect()
        .await;

        debug!(
            calls = proposals.len(),
            path = ?path,
            duration_ms = started.elapsed().as_millis() as u64,
            "Dispatch complete"
        );

        // Stamp bookkeeping metadata the compactor digests later; tools
        // that already report these keys win.
        for (proposal, result) in proposals.iter().zip(results.iter_mut()) {
            let kind = registry.kind_of(&proposal.tool).unwrap_or(ToolKind::Other);
            match kind {
                ToolKind::Search => {
                    if !result.metadata.contains_key("query") {
                        if let Some(q) = proposal.args.get("query").cloned() {
                            result.metadata.insert("query".into(), q);
                        }
                    }
                }
                ToolKind::Fetch => {
                    if !result.metadata.contains_key("source_id") {
                        if let Some(u) = proposal.args.get("url").cloned() {
                            result.metadata.insert("source_id".into(), u);
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(tracker) = tracker {
            for (proposal, result) in proposals.iter().zip(results.iter()) {
                let kind = registry.kind_of(&proposal.tool).unwrap_or(ToolKind::Other);
                tracker.record_result(kind, result, &proposal.args, path);
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::WireFormat;
    use crate::test_helpers::{standard_test_registry, FailingTool, SlowTool};

    fn proposal(tool: &str, args: serde_json::Value) -> ToolProposal {
        ToolProposal {
            tool: tool.into(),
            args: args.as_object().cloned().unwrap_or_default(),
            provenance: WireFormat::Tag,
        }
    }

    #[tokio::test]
    async fn single_proposal_uses_individual_path() {
        let registry = standard_test_registry();
        let mut tracker = ResearchTracker::new();
        let dispatcher = ToolDispatcher::new(3);

        let results = dispatcher
            .dispatch(
                &registry,
                SessionMode::Research,
                &[proposal("web_search", serde_json::json!({"query": "rust"}))],
                Some(&mut tracker),
            )
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(tracker.path_counters.individual, 1);
        assert_eq!(tracker.path_counters.batch, 0);
        assert_eq!(tracker.search_count, 1);
    }

    #[tokio::test]
    async fn batch_preserves_proposal_order() {
        let mut registry = standard_test_registry();
        registry.register(Box::new(SlowTool::new("slow_echo", 30)));

        let dispatcher = ToolDispatcher::new(3);
        let proposals = vec![
            proposal("slow_echo", serde_json::json!({"text": "first"})),
            proposal("web_search", serde_json::json!({"query": "second"})),
            proposal("web_search", serde_json::json!({"query": "third"})),
        ];

        let results = dispatcher
            .dispatch(&registry, SessionMode::Research, &proposals, None)
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].tool, "slow_echo");
        assert_eq!(results[1].metadata["query"], "second");
        assert_eq!(results[2].metadata["query"], "third");
    }

    #[tokio::test]
    async fn failing_slot_isolated_from_siblings() {
        let mut registry = standard_test_registry();
        registry.register(Box::new(FailingTool::new("broken_fetch", "backend down")));

        let dispatcher = ToolDispatcher::new(3);
        let proposals = vec![
            proposal("broken_fetch", serde_json::json!({"url": "https://x.example"})),
            proposal("web_fetch", serde_json::json!({"url": "https://ok.example"})),
        ];

        let results = dispatcher
            .dispatch(&registry, SessionMode::Research, &proposals, None)
            .await;

        assert!(results[0].is_error());
        assert!(!results[1].is_error());
        assert_eq!(results[1].source_id(), Some("https://ok.example"));
    }

    #[tokio::test]
    async fn batch_and_individual_land_on_identical_tracker_state() {
        let registry = standard_test_registry();
        let dispatcher = ToolDispatcher::new(3);
        let urls = ["https://a.example", "https://b.example", "https://c.example"];

        // One parallel batch of three.
        let mut batch_tracker = ResearchTracker::new();
        let proposals: Vec<ToolProposal> = urls
            .iter()
            .map(|u| proposal("web_fetch", serde_json::json!({"url": u})))
            .collect();
        dispatcher
            .dispatch(&registry, SessionMode::Research, &proposals, Some(&mut batch_tracker))
            .await;

        // Three individual calls.
        let mut seq_tracker = ResearchTracker::new();
        for u in urls {
            dispatcher
                .dispatch(
                    &registry,
                    SessionMode::Research,
                    &[proposal("web_fetch", serde_json::json!({"url": u}))],
                    Some(&mut seq_tracker),
                )
                .await;
        }

        assert_eq!(batch_tracker.distinct_source_ids, seq_tracker.distinct_source_ids);
        assert_eq!(batch_tracker.tool_call_count, seq_tracker.tool_call_count);
        assert_eq!(batch_tracker.fetch_count, seq_tracker.fetch_count);
        // Only the observability counters differ.
        assert_eq!(batch_tracker.path_counters.batch, 3);
        assert_eq!(seq_tracker.path_counters.individual, 3);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_slot() {
        let registry = standard_test_registry();
        let dispatcher = ToolDispatcher::new(3);
        let results = dispatcher
            .dispatch(
                &registry,
                SessionMode::QuickLookup,
                &[proposal("not_a_tool", serde_json::json!({}))],
                None,
            )
            .await;
        assert!(results[0].is_error());
    }
}
