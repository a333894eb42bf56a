//! Per-session conversation state.
//!
//! The store owns all mutable session state. Each session id maps to its
//! own async mutex so turns within a session serialize (read-then-append
//! stays atomic) while unrelated sessions proceed in parallel. The full
//! turn log is retained as the source of truth; prompt construction sees
//! only a bounded window of recent turns.

use crate::types::ConversationTurn;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Turn log for one conversation id.
#[derive(Debug, Default)]
pub struct SessionState {
    turns: Vec<ConversationTurn>,
}

impl SessionState {
    /// Append a turn to the log. Append-only; existing turns never change.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// The most recent `window` turns, oldest first.
    pub fn window(&self, window: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    /// Total turns retained (the full log, not the window).
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Owns every session's state, keyed by conversation id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    window: usize,
}

impl SessionStore {
    /// Create a store with the given prompt window size.
    pub fn new(window: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            window,
        }
    }

    /// Configured window size.
    pub fn window_size(&self) -> usize {
        self.window
    }

    /// Get the state handle for a session, creating it lazily.
    ///
    /// Callers lock the returned handle for the duration of a turn, which
    /// serializes turns within the session.
    pub fn session(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        // Fast path: session already exists
        {
            let sessions = self.sessions.read().expect("session map lock poisoned");
            if let Some(state) = sessions.get(session_id) {
                return Arc::clone(state);
            }
        }

        let mut sessions = self.sessions.write().expect("session map lock poisoned");
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionState::default()))),
        )
    }

    /// Bounded context window for a session, oldest first.
    pub async fn context(&self, session_id: &str) -> Vec<ConversationTurn> {
        let state = self.session(session_id);
        let guard = state.lock().await;
        guard.window(self.window).to_vec()
    }

    /// Append a turn to a session's log.
    pub async fn append_turn(&self, session_id: &str, turn: ConversationTurn) {
        let state = self.session(session_id);
        let mut guard = state.lock().await;
        guard.append(turn);
    }
}
