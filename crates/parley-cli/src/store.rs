//! File-backed session store

use async_trait::async_trait;
use parley_agent::{Result, SessionStore, codec};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk record for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    session_id: String,
    updated_at: i64,
    state: String,
}

/// Stores each session as one JSON file, named by the hash of its id.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the default sessions directory
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
            .join("sessions")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_key(session_id)))
    }

    /// List all stored sessions, most recently updated first
    pub fn list(&self) -> std::io::Result<Vec<SessionInfo>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(info) = read_session_info(&path) {
                    sessions.push(info);
                }
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load(&self, session_id: &str) -> Result<Option<String>> {
        let path = self.path_for(session_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(parley_agent::Error::store(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        match serde_json::from_str::<StoredSession>(&content) {
            Ok(stored) => Ok(Some(stored.state)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn save(&self, session_id: &str, state: String) -> Result<()> {
        let record = StoredSession {
            session_id: session_id.to_string(),
            updated_at: chrono::Utc::now().timestamp_millis(),
            state,
        };
        let content = serde_json::to_string(&record).map_err(parley_agent::Error::store)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(parley_agent::Error::store)?;

        let path = self.path_for(session_id);
        let tmp = self.dir.join(format!(
            "{}.{}.tmp",
            session_key(session_id),
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(parley_agent::Error::store)?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(parley_agent::Error::store(format!(
                "failed to write {}: {}",
                path.display(),
                e
            )));
        }

        tracing::debug!(session_id, path = %path.display(), "session saved");
        Ok(())
    }
}

/// File stem for a session id: hex SHA-256, so any id is a safe file name
pub fn session_key(session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn read_session_info(path: &Path) -> Option<SessionInfo> {
    let content = fs::read_to_string(path).ok()?;
    let stored: StoredSession = serde_json::from_str(&content).ok()?;
    let message_count = codec::decode(&stored.state)
        .map(|conversation| conversation.len())
        .ok();

    Some(SessionInfo {
        session_id: stored.session_id,
        updated_at: stored.updated_at,
        message_count,
    })
}

/// Information about a stored session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub updated_at: i64,
    /// `None` when the stored state no longer decodes
    pub message_count: Option<usize>,
}

impl SessionInfo {
    /// Format the updated_at timestamp for display
    pub fn updated_at_display(&self) -> String {
        use chrono::{TimeZone, Utc};
        Utc.timestamp_millis_opt(self.updated_at)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
