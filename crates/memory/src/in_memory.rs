//! In-memory stores: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use recollect_core::error::StorageError;
use recollect_core::message::Message;
use recollect_core::session::SessionId;
use recollect_core::store::{MessageStore, StoredMessage, TranscriptStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Chat history held in a map of per-chat vectors.
#[derive(Default)]
pub struct InMemoryMessageStore {
    chats: Arc<RwLock<HashMap<String, Vec<StoredMessage>>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to `chat_id`.
    pub async fn push(&self, chat_id: &str, message: StoredMessage) {
        self.chats
            .write()
            .await
            .entry(chat_id.to_string())
            .or_default()
            .push(message);
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn get_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        let chats = self.chats.read().await;
        let Some(messages) = chats.get(chat_id) else {
            return Ok(Vec::new());
        };
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }
}

/// Transcripts keyed by session id.
#[derive(Default)]
pub struct InMemoryTranscriptStore {
    sessions: Arc<RwLock<HashMap<SessionId, Vec<Message>>>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn append_to_transcript(
        &self,
        session_id: &SessionId,
        message: &Message,
    ) -> Result<(), StorageError> {
        self.sessions
            .write()
            .await
            .entry(session_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn read_transcript(&self, session_id: &SessionId) -> Result<Vec<Message>, StorageError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| StorageError::SessionNotFound(session_id.to_string()))
    }
}
