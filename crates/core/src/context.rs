//! ContextProvider trait — the seam to the retrieval/memory subsystem.
//!
//! The turn controller consumes contextual text through this one call.
//! Retrieval, ranking, and decay all live behind it and are out of scope
//! for the control core.

use async_trait::async_trait;

use crate::message::SessionId;
use crate::tool::ToolResult;

/// Renders contextual text for a prompt from stored memory plus the
/// current turn's tool results.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn render_context(
        &self,
        session_id: &SessionId,
        query: &str,
        turn_results: &[ToolResult],
    ) -> String;
}

/// A context provider that returns nothing. Useful for tests and for
/// deployments without a memory subsystem.
pub struct PassthroughContext;

#[async_trait]
impl ContextProvider for PassthroughContext {
    async fn render_context(
        &self,
        _session_id: &SessionId,
        _query: &str,
        _turn_results: &[ToolResult],
    ) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_renders_empty() {
        let ctx = PassthroughContext;
        let rendered = ctx.render_context(&SessionId::new(), "query", &[]).await;
        assert!(rendered.is_empty());
    }
}
