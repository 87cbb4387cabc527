//! Conversation session store
//!
//! Keeps per-session chat history in memory so follow-up questions can
//! reference earlier turns. Sessions are identified by the caller-chosen
//! id from the HTTP path or query string.

use dashmap::DashMap;

use crate::llm::ChatTurn;

/// Oldest turns are dropped once a session grows past this.
pub const MAX_SESSION_TURNS: usize = 200;

/// In-memory history keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Vec<ChatTurn>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the turns recorded for a session, oldest first.
    /// Unknown sessions yield an empty history.
    pub fn history(&self, session_id: &str) -> Vec<ChatTurn> {
        self.sessions
            .get(session_id)
            .map(|turns| turns.clone())
            .unwrap_or_default()
    }

    /// Append turns to a session, trimming the oldest entries past the cap.
    pub fn append(&self, session_id: &str, turns: Vec<ChatTurn>) {
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        entry.extend(turns);
        let len = entry.len();
        if len > MAX_SESSION_TURNS {
            entry.drain(..len - MAX_SESSION_TURNS);
        }
    }

    /// Drop a session's history entirely.
    pub fn clear(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
