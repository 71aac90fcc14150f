//! Context compactor — bounds conversation growth within a turn.
//!
//! Once a turn has accumulated more tool results than the mode's threshold,
//! older results stop being echoed verbatim. The most recent few stay
//! intact; the rest collapse into one digest line per tool kind (call
//! count plus distinct queries or sources, never full content).
//!
//! Compaction is a pure function of its input: identical result lists
//! always produce byte-identical digests. Grouping goes through BTree
//! collections so iteration order never depends on hash seeds.

use std::collections::{BTreeMap, BTreeSet};

use hearthloop_core::{ToolKind, ToolResult};

/// Per-mode compaction settings.
#[derive(Debug, Clone, Copy)]
pub struct Compactor {
    /// Result count above which compaction kicks in
    pub threshold: usize,
    /// How many most-recent results stay verbatim
    pub tail: usize,
}

impl Compactor {
    pub fn new(threshold: usize, tail: usize) -> Self {
        Self { threshold, tail }
    }

    /// Split results into a verbatim tail and a digest of the remainder.
    ///
    /// Below the threshold everything stays verbatim and the digest is
    /// `None`. `kind_of` resolves a tool name to its kind; unregistered
    /// names fall back to [`ToolKind::Other`].
    pub fn compact<'a>(
        &self,
        results: &'a [ToolResult],
        kind_of: impl Fn(&str) -> ToolKind,
    ) -> (&'a [ToolResult], Option<String>) {
        if results.len() <= self.threshold {
            return (results, None);
        }

        let split = results.len().saturating_sub(self.tail);
        let (older, tail) = results.split_at(split);

        let mut groups: BTreeMap<ToolKind, KindStats> = BTreeMap::new();
        for result in older {
            let kind = kind_of(&result.tool);
            let stats = groups.entry(kind).or_default();
            stats.calls += 1;
            match kind {
                ToolKind::Search => {
                    if let Some(q) = result.metadata.get("query").and_then(|v| v.as_str()) {
                        stats.items.insert(q.to_string());
                    }
                }
                ToolKind::Fetch => {
                    if let Some(s) = result.source_id() {
                        stats.items.insert(s.to_string());
                    }
                }
                _ => {}
            }
            if result.is_error() {
                stats.errors += 1;
            }
        }

        let mut digest = String::from("[earlier tool activity, compacted]\n");
        for (kind, stats) in &groups {
            digest.push_str(&format!("- {}: {} call(s)", kind.label(), stats.calls));
            if !stats.items.is_empty() {
                let noun = match kind {
                    ToolKind::Search => "distinct queries",
                    _ => "distinct sources",
                };
                let listed: Vec<&str> = stats.items.iter().map(String::as_str).collect();
                digest.push_str(&format!(", {} {}: {}", stats.items.len(), noun, listed.join(", ")));
            }
            if stats.errors > 0 {
                digest.push_str(&format!(", {} failed", stats.errors));
            }
            digest.push('\n');
        }

        (tail, Some(digest))
    }
}

#[derive(Default)]
struct KindStats {
    calls: usize,
    errors: usize,
    items: BTreeSet<String>,
}
