//! Storage traits: raw chat history, session transcripts, and the daily log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::message::Message;
use crate::session::SessionId;

/// One stored chat turn as persisted by the messaging layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub text: String,

    /// Whether the agent (rather than the user) sent this turn
    #[serde(default)]
    pub is_from_agent: bool,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    pub fn from_user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_from_agent: false,
            timestamp: Utc::now(),
        }
    }

    pub fn from_agent(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_from_agent: true,
            timestamp: Utc::now(),
        }
    }
}

/// Raw per-chat message history.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// At most `limit` most-recent turns for `chat_id`, oldest first.
    async fn get_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<StoredMessage>, StorageError>;
}

/// Append-only transcript per session.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn append_to_transcript(
        &self,
        session_id: &SessionId,
        message: &Message,
    ) -> std::result::Result<(), StorageError>;

    async fn read_transcript(
        &self,
        session_id: &SessionId,
    ) -> std::result::Result<Vec<Message>, StorageError>;
}

/// Durable daily notes written by the memory flush.
#[async_trait]
pub trait DailyLog: Send + Sync {
    async fn write_summary(&self, text: &str) -> std::result::Result<(), StorageError>;
}
