//! InferenceProvider trait — the abstraction over LLM backends.
//!
//! A provider knows how to send a conversation to a model and get raw text
//! back. Temperature, token budget, and stop sequences are per-call
//! overrides because the turn controller varies them by mode and phase:
//! lower temperature for tool-selection turns, higher for free-form
//! synthesis.
//!
//! The response is plain text. Tool-call extraction belongs to the parser
//! chain, not the provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a single chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated text, as-is. May contain tool-call markup.
    pub text: String,

    /// Which model actually responded
    pub model: String,

    /// Token usage statistics
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core InferenceProvider trait.
///
/// Every backend implements this trait. The turn controller calls `chat()`
/// without knowing which provider is behind it.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get the raw model text back.
    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_defaults() {
        let req = ChatRequest {
            messages: vec![],
            temperature: default_temperature(),
            max_tokens: None,
            stop: vec![],
        };
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.stop.is_empty());
    }

    #[test]
    fn chat_request_deserializes_with_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"messages": []}"#).unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }
}
