//! Session — the caller-owned unit of conversation state.
//!
//! A session holds the active mode, the conversation history, and the tool
//! results accumulated during the current turn. The control core mutates it
//! only through the turn controller's contract.
//!
//! A session processes at most one turn at a time. `run_turn` takes
//! `&mut Session`, so single-threaded callers get serialization from the
//! borrow checker for free. Callers that share a session across tasks wrap
//! it in [`SharedSession`], whose async mutex serializes turns per session id.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::message::{Conversation, SessionId};
use crate::mode::SessionMode;
use crate::tool::ToolResult;

/// Per-session conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,

    /// Active mode for this session
    pub mode: SessionMode,

    /// Conversation history
    pub conversation: Conversation,

    /// Tool results accumulated during the current turn.
    /// Cleared when a new turn starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub turn_results: Vec<ToolResult>,
}

impl Session {
    /// Create a new session in the given mode.
    pub fn new(mode: SessionMode) -> Self {
        Self {
            id: SessionId::new(),
            mode,
            conversation: Conversation::new(),
            turn_results: Vec::new(),
        }
    }

    /// Reset per-turn state. Called by the turn controller at turn start.
    pub fn begin_turn(&mut self) {
        self.turn_results.clear();
    }
}

/// A session shared across tasks. The mutex guarantees that two user turns
/// for the same session never run concurrently.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Lock the session for the duration of one turn.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Session> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn begin_turn_clears_results() {
        let mut session = Session::new(SessionMode::Research);
        session.turn_results.push(ToolResult::ok("web_search", "s", "c"));
        session.begin_turn();
        assert!(session.turn_results.is_empty());
    }

    #[tokio::test]
    async fn shared_session_serializes_access() {
        let shared = SharedSession::new(Session::new(SessionMode::QuickLookup));

        {
            let mut guard = shared.lock().await;
            guard.conversation.push(Message::user("turn one"));
        }

        let other = shared.clone();
        let guard = other.lock().await;
        assert_eq!(guard.conversation.messages.len(), 1);
    }
}
