//! Conversation history persisted as a JSON array file

use crate::llm::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to write session file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove session file {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize session history: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub response: String,
    /// Which path produced the response: chat, tool, code or failure
    pub stage: String,
}

/// Append-only turn history. The whole file is rewritten on each append.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    entries: Vec<SessionEntry>,
}

impl SessionStore {
    /// Loads `path` if it exists. A missing or unreadable file starts an
    /// empty history.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<SessionEntry>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Session file is corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read session file, starting empty");
                Vec::new()
            }
        };

        debug!(path = %path.display(), turns = entries.len(), "Session history loaded");
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn append(
        &mut self,
        user: impl Into<String>,
        response: impl Into<String>,
        stage: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.entries.push(SessionEntry {
            timestamp: Utc::now(),
            user: user.into(),
            response: response.into(),
            stage: stage.into(),
        });
        self.save().await
    }

    async fn save(&self) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| SessionError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content).await.map_err(|source| SessionError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// The last `turns` entries as alternating user/assistant messages,
    /// oldest first.
    pub fn recent_context(&self, turns: usize) -> Vec<ChatMessage> {
        let start = self.entries.len().saturating_sub(turns);
        self.entries[start..]
            .iter()
            .flat_map(|entry| {
                [
                    ChatMessage::user(entry.user.clone()),
                    ChatMessage::assistant(entry.response.clone()),
                ]
            })
            .collect()
    }

    pub async fn clear(&mut self) -> Result<(), SessionError> {
        self.entries.clear();
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_persists_across_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let mut store = SessionStore::load(&path).await;
        assert!(store.is_empty());
        store.append("hi", "hello", "chat").await.unwrap();
        store.append("time?", "noon", "tool").await.unwrap();

        let reloaded = SessionStore::load(&path).await;
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entries()[1].stage, "tool");
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SessionStore::load(&path).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_recent_context_takes_latest_turns() {
        let dir = TempDir::new().unwrap();
        let mut store = SessionStore::load(dir.path().join("h.json")).await;
        for i in 0..4 {
            store.append(format!("q{}", i), format!("a{}", i), "chat").await.unwrap();
        }

        let context = store.recent_context(2);

        assert_eq!(context.len(), 4);
        assert_eq!(context[0].role, MessageRole::User);
        assert_eq!(context[0].content, "q2");
        assert_eq!(context[3].role, MessageRole::Assistant);
        assert_eq!(context[3].content, "a3");
        assert!(store.recent_context(0).is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.json");
        let mut store = SessionStore::load(&path).await;
        store.append("q", "a", "chat").await.unwrap();

        store.clear().await.unwrap();

        assert!(store.is_empty());
        assert!(!path.exists());
        store.clear().await.unwrap();
    }
}
