//! # hearthloop Agent
//!
//! The per-turn control core: the turn controller and everything it
//! composes. A turn flows through this crate as
//!
//! ```text
//! provider text -> repair -> parser chain -> policy review -> dispatch
//!              -> tracker / compactor -> next iteration's prompt
//! ```
//!
//! The domain traits live in `hearthloop-core`; this crate supplies the
//! loop that drives them.

pub mod compactor;
pub mod dispatch;
pub mod parser;
pub mod policy;
pub mod prompt;
pub mod tracker;
pub mod turn;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use compactor::Compactor;
pub use dispatch::ToolDispatcher;
pub use parser::{extract_plan, ParserChain, ToolProposal, WireFormat};
pub use policy::{ArgRule, PolicyDecision, Rejection, ToolPolicy};
pub use prompt::{render_manifest, system_preamble, ManifestStyle, SYNTHESIS_MARKERS};
pub use tracker::{DispatchPath, PathCounters, ResearchTracker};
pub use turn::{TurnController, TurnOutcome};
