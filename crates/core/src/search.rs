//! Retrieval traits: embeddings and hybrid (keyword + vector) search.
//!
//! The ranking math lives behind these traits; the context builder only
//! consumes ranked results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, SearchError};

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The matched text
    pub text: String,

    /// Where it came from (document ID for knowledge, chat ID for messages)
    pub source_id: String,

    /// Fused relevance score, higher is better
    #[serde(default)]
    pub relevance_score: f32,
}

/// Options for a search call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Restrict message search to one chat. `None` searches all chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,

    /// Maximum number of results
    pub limit: usize,
}

impl SearchOptions {
    pub fn limit(limit: usize) -> Self {
        Self {
            chat_id: None,
            limit,
        }
    }

    pub fn in_chat(chat_id: impl Into<String>, limit: usize) -> Self {
        Self {
            chat_id: Some(chat_id.into()),
            limit,
        }
    }
}

/// Turns query text into a vector.
///
/// Deterministic for a given model. May return an empty vector when
/// embeddings are disabled, in which case search degrades to keyword-only.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn embed_query(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError>;
}

/// Keyword + vector fused retrieval over long-term knowledge and chat history.
///
/// Results are sorted by descending relevance.
#[async_trait]
pub trait HybridSearch: Send + Sync {
    async fn search_knowledge(
        &self,
        query: &str,
        embedding: &[f32],
        options: SearchOptions,
    ) -> std::result::Result<Vec<RetrievedChunk>, SearchError>;

    async fn search_messages(
        &self,
        query: &str,
        embedding: &[f32],
        options: SearchOptions,
    ) -> std::result::Result<Vec<RetrievedChunk>, SearchError>;
}
