//! # hearthloop Core
//!
//! Domain types, traits, and error definitions for the hearthloop assistant
//! control core. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the inference
//! provider, the tool registry, and the context/memory provider. The turn
//! controller in `hearthloop-agent` composes them without knowing which
//! implementation is behind each seam. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod context;
pub mod error;
pub mod message;
pub mod mode;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::{ContextProvider, PassthroughContext};
pub use error::{Error, ProviderError, Result};
pub use message::{Conversation, Message, Role, SessionId};
pub use mode::{ResearchPhase, SessionMode};
pub use provider::{ChatRequest, ChatResponse, InferenceProvider, Usage};
pub use session::{Session, SharedSession};
pub use tool::{Tool, ToolDefinition, ToolKind, ToolRegistry, ToolRequest, ToolResult};
