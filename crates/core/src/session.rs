//! Session identity.
//!
//! A session is the active transcript head for a chat. Compaction supersedes
//! a session with a new ID; the old transcript stays readable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat's active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub chat_id: String,
    /// Where the transcript lives (path or store key)
    pub transcript_ref: String,
}

impl Session {
    pub fn new(chat_id: impl Into<String>, transcript_ref: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            chat_id: chat_id.into(),
            transcript_ref: transcript_ref.into(),
        }
    }

    /// The session that replaces this one after compaction.
    pub fn supersede(&self, id: SessionId, transcript_ref: impl Into<String>) -> Self {
        Self {
            id,
            chat_id: self.chat_id.clone(),
            transcript_ref: transcript_ref.into(),
        }
    }
}
