//! Session modes and research phases.
//!
//! Every session runs in exactly one mode, and the mode drives the turn
//! controller's protocol: iteration ceilings, temperatures, which tools are
//! offered, and what counts as a finished turn.

use serde::{Deserialize, Serialize};

/// The operating mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// One or two tool calls at most, answer fast.
    QuickLookup,
    /// Multi-phase research: plan, gather sources, synthesize.
    Research,
    /// Store something the user said; finished once memory is written.
    Ingest,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionMode::QuickLookup => "quick_lookup",
            SessionMode::Research => "research",
            SessionMode::Ingest => "ingest",
        };
        write!(f, "{s}")
    }
}

/// The phase of a Research-mode turn, derived from tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    /// No plan accepted yet.
    Planning,
    /// Plan accepted, gathering sources.
    Execution,
    /// Synthesis prompted; the model is writing the final report.
    Synthesis,
}

impl std::fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResearchPhase::Planning => "planning",
            ResearchPhase::Execution => "execution",
            ResearchPhase::Synthesis => "synthesis",
        };
        write!(f, "{s}")
    }
}
