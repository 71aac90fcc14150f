//! Tool policy — admission control for parsed proposals.
//!
//! Every proposal passes through `review` before anything executes. The
//! policy approves, sanitizes, or rejects; it never executes tools itself,
//! and rejections are never silent — the turn controller echoes them back
//! into the conversation so the model can adapt.
//!
//! Sanitation and rejection are distinct outcomes: an over-long query is
//! truncated and **approved**; a query that targets the local filesystem is
//! **rejected** outright and never reaches a tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use hearthloop_config::PolicyConfig;
use hearthloop_core::ToolRegistry;

use crate::parser::ToolProposal;

/// The outcome of reviewing one model response's proposals.
#[derive(Debug, Clone, Default)]
pub struct PolicyDecision {
    /// Proposals cleared for dispatch (possibly with sanitized args).
    pub approved: Vec<ToolProposal>,
    /// Proposals denied, with reasons the model can read.
    pub rejected: Vec<Rejection>,
}

/// A denied proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    /// Tool name from the proposal
    pub tool: String,
    /// Human-readable denial reason
    pub reason: String,
    /// Arguments as they stood after any sanitation that ran before the
    /// rejecting rule fired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_args: Option<serde_json::Map<String, Value>>,
}

/// A single argument constraint.
#[derive(Debug, Clone)]
pub enum ArgRule {
    /// String argument length bounds: below `min` rejects, above `max`
    /// truncates (sanitizes) rather than rejects.
    StringBounds { key: String, min: usize, max: usize },
    /// Numeric argument cap: values above `max` are clamped, not rejected.
    NumericCap { key: String, max: u64 },
    /// The argument must equal one of the allowed values.
    AllowList { key: String, allowed: Vec<String> },
}

/// Admission-control policy over tool proposals.
pub struct ToolPolicy {
    rules: HashMap<String, Vec<ArgRule>>,
}

impl ToolPolicy {
    /// An empty policy: registered tools pass, unregistered ones don't,
    /// dangerous patterns are still rejected everywhere.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// The standard policy for the built-in tool surface, parameterized by
    /// configured limits.
    pub fn standard(config: &PolicyConfig) -> Self {
        Self::new()
            .with_rules(
                "web_search",
                vec![
                    ArgRule::StringBounds {
                        key: "query".into(),
                        min: config.query_min_len,
                        max: config.query_max_len,
                    },
                    ArgRule::NumericCap {
                        key: "max_results".into(),
                        max: config.max_results,
                    },
                ],
            )
            .with_rules(
                "web_fetch",
                vec![ArgRule::StringBounds {
                    key: "url".into(),
                    min: "http://a.b".len(),
                    max: 2048,
                }],
            )
            .with_rules(
                "memory_read",
                vec![ArgRule::StringBounds {
                    key: "query".into(),
                    min: config.query_min_len,
                    max: config.query_max_len,
                }],
            )
            .with_rules(
                "memory_write",
                vec![
                    ArgRule::AllowList {
                        key: "namespace".into(),
                        allowed: config.write_namespaces.clone(),
                    },
                    ArgRule::StringBounds {
                        key: "content".into(),
                        min: 1,
                        max: 8192,
                    },
                ],
            )
    }

    /// Attach validation rules for a tool, builder-style.
    pub fn with_rules(mut self, tool: impl Into<String>, rules: Vec<ArgRule>) -> Self {
        self.rules.insert(tool.into(), rules);
        self
    }

    /// Review proposals against the registry and the per-tool rules.
    pub fn review(&self, proposals: Vec<ToolProposal>, registry: &ToolRegistry) -> PolicyDecision {
        let mut decision = PolicyDecision::default();

        'proposal: for mut proposal in proposals {
            if !registry.contains(&proposal.tool) {
                warn!(tool = %proposal.tool, "Policy rejected unregistered tool");
                decision.rejected.push(Rejection {
                    tool: proposal.tool,
                    reason: "not a registered tool".into(),
                    sanitized_args: None,
                });
                continue;
            }

            // Dangerous patterns are rejected regardless of tool: a local
            // filesystem scheme, UNC path, or traversal sequence must never
            // be forwarded as a search string or URL.
            for (key, value) in &proposal.args {
                if let Some(s) = value.as_str() {
                    if let Some(pattern) = dangerous_pattern(s) {
                        warn!(tool = %proposal.tool, arg = %key, pattern, "Policy rejected dangerous argument");
                        decision.rejected.push(Rejection {
                            tool: proposal.tool,
                            reason: format!("argument '{key}' contains a forbidden pattern ({pattern})"),
                            sanitized_args: None,
                        });
                        continue 'proposal;
                    }
                }
            }

            let mut sanitized = false;
            if let Some(rules) = self.rules.get(&proposal.tool) {
                for rule in rules {
                    match apply_rule(rule, &mut proposal.args) {
                        RuleOutcome::Pass => {}
                        RuleOutcome::Sanitized(note) => {
                            debug!(tool = %proposal.tool, %note, "Policy sanitized argument");
                            sanitized = true;
                        }
                        RuleOutcome::Reject(reason) => {
                            warn!(tool = %proposal.tool, %reason, "Policy rejected proposal");
                            decision.rejected.push(Rejection {
                                tool: proposal.tool,
                                reason,
                                sanitized_args: sanitized.then(|| proposal.args.clone()),
                            });
                            continue 'proposal;
                        }
                    }
                }
            }

            decision.approved.push(proposal);
        }

        decision
    }
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self::new()
    }
}

enum RuleOutcome {
    Pass,
    Sanitized(String),
    Reject(String),
}

fn apply_rule(rule: &ArgRule, args: &mut serde_json::Map<String, Value>) -> RuleOutcome {
    match rule {
        ArgRule::StringBounds { key, min, max } => {
            let Some(s) = args.get(key).and_then(|v| v.as_str()) else {
                return RuleOutcome::Reject(format!("missing required string argument '{key}'"));
            };
            let len = s.chars().count();
            if len < *min {
                return RuleOutcome::Reject(format!(
                    "argument '{key}' too short ({len} < {min} chars)"
                ));
            }
            if len > *max {
                let truncated: String = s.chars().take(*max).collect();
                args.insert(key.clone(), Value::String(truncated));
                return RuleOutcome::Sanitized(format!("truncated '{key}' to {max} chars"));
            }
            RuleOutcome::Pass
        }
        ArgRule::NumericCap { key, max } => {
            let Some(n) = args.get(key).and_then(|v| v.as_u64()) else {
                // Absent or non-numeric caps are a tool-side default, not a
                // policy matter.
                return RuleOutcome::Pass;
            };
            if n > *max {
                args.insert(key.clone(), Value::from(*max));
                return RuleOutcome::Sanitized(format!("clamped '{key}' from {n} to {max}"));
            }
            RuleOutcome::Pass
        }
        ArgRule::AllowList { key, allowed } => {
            let Some(s) = args.get(key).and_then(|v| v.as_str()) else {
                return RuleOutcome::Reject(format!("missing required argument '{key}'"));
            };
            if allowed.iter().any(|a| a == s) {
                RuleOutcome::Pass
            } else {
                RuleOutcome::Reject(format!("'{s}' is not an allowed value for '{key}'"))
            }
        }
    }
}

/// Identify a forbidden pattern in a string argument, if present.
fn dangerous_pattern(s: &str) -> Option<&'static str> {
    if contains_file_scheme(s) {
        return Some("local file scheme");
    }
    if s.contains("\\\\") {
        return Some("UNC path");
    }
    if s.contains("../") || s.contains("..\\") {
        return Some("path traversal");
    }
    None
}

/// A `file:` scheme anywhere in the string, single- or double-slash form.
/// Schemes start at a word boundary, so "profile: settings" stays clean.
fn contains_file_scheme(s: &str) -> bool {
    let lower = s.to_lowercase();
    let mut from = 0;
    while let Some(offset) = lower[from..].find("file:") {
        let pos = from + offset;
        let preceded_by_word = lower[..pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric());
        if !preceded_by_word {
            return true;
        }
        from = pos + "file:".len();
    }
    false
}
