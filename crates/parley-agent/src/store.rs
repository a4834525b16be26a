//! Session store: key-value persistence of serialized conversations.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::Result;

/// Persistence for serialized conversation state, keyed by session id.
///
/// Stores make no concurrency promises; callers that run several turns of
/// one session at once must serialize them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the stored state for a session. Unknown sessions yield `None`.
    async fn load(&self, session_id: &str) -> Result<Option<String>>;

    /// Replace the stored state for a session.
    async fn save(&self, session_id: &str, state: String) -> Result<()>;
}

/// In-process store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether the store holds no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Stored state for a session, read synchronously
    pub fn get(&self, session_id: &str) -> Option<String> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// Seed raw state for a session
    pub fn insert(&self, session_id: impl Into<String>, state: impl Into<String>) {
        self.sessions.lock().insert(session_id.into(), state.into());
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self.get(session_id))
    }

    async fn save(&self, session_id: &str, state: String) -> Result<()> {
        self.sessions.lock().insert(session_id.to_string(), state);
        Ok(())
    }
}
