//! Summarization traits: conversation summaries and session-memory extraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, SummarizerError};
use crate::message::{Context, Message};
use crate::session::SessionId;

/// Credentials and model hints for summarization calls.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SummarizerCredentials {
    pub api_key: String,

    /// Provider name, if the host routes between several
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Cheaper model to try first for summaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utility_model: Option<String>,
}

impl SummarizerCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            provider: None,
            utility_model: None,
        }
    }
}

impl std::fmt::Debug for SummarizerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizerCredentials")
            .field("api_key", &"[REDACTED]")
            .field("provider", &self.provider)
            .field("utility_model", &self.utility_model)
            .finish()
    }
}

/// Input to a summarization call.
#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub messages: Vec<Message>,
    pub credentials: SummarizerCredentials,
    /// Model context window, in tokens
    pub context_window: usize,
    /// Upper bound on the summary length, in tokens
    pub max_summary_tokens: usize,
    pub custom_instructions: Option<String>,
}

/// Result of a summarization call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub summary: String,
    pub tokens_used: usize,
    pub chunks_processed: usize,
}

/// Produces a structured summary of a message sequence.
///
/// May retry or fall back across models internally; a returned error means
/// every attempt failed.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize_with_fallback(
        &self,
        request: SummarizeRequest,
    ) -> std::result::Result<SummaryOutput, SummarizerError>;
}

/// Input to the session-memory hook.
#[derive(Debug, Clone)]
pub struct SessionMemoryRequest<'a> {
    pub old_session_id: &'a SessionId,
    pub new_session_id: &'a SessionId,
    pub context: &'a Context,
    pub chat_id: &'a str,
    pub credentials: &'a SummarizerCredentials,
}

/// Extracts durable memory from a session before its raw content is compacted.
#[async_trait]
pub trait SessionMemoryHook: Send + Sync {
    async fn save_session_memory(
        &self,
        request: SessionMemoryRequest<'_>,
    ) -> std::result::Result<(), Error>;
}
