//! In-process hybrid search over knowledge documents and chat messages.
//!
//! Keyword and vector rankings are computed separately and merged with
//! reciprocal rank fusion. With an empty query embedding, search is
//! keyword-only.

use async_trait::async_trait;
use recollect_core::error::{SearchError, StorageError};
use recollect_core::search::{HybridSearch, RetrievedChunk, SearchOptions};
use recollect_core::store::StoredMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::vector::{RRF_K, reciprocal_rank_fusion, vector_rank};

/// One searchable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Knowledge document id, or chat id for messages
    pub source_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Hybrid search held entirely in memory.
#[derive(Default)]
pub struct InMemoryHybridSearch {
    knowledge: Arc<RwLock<Vec<Document>>>,
    messages: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryHybridSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_knowledge(&self, document: Document) {
        self.knowledge.write().await.push(document);
    }

    pub async fn add_message(&self, document: Document) {
        self.messages.write().await.push(document);
    }

    /// Index a chat's stored turns for message search.
    pub async fn index_chat(&self, chat_id: &str, messages: &[StoredMessage]) {
        let mut indexed = self.messages.write().await;
        indexed.extend(
            messages
                .iter()
                .filter(|m| !m.text.trim().is_empty())
                .map(|m| Document::new(chat_id, m.text.clone())),
        );
    }

    /// Load knowledge documents from a JSONL file of [`Document`]s.
    ///
    /// A missing file loads nothing. Corrupted lines are skipped.
    pub async fn load_knowledge(&self, path: &Path) -> Result<usize, StorageError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StorageError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let documents: Vec<Document> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupted knowledge entry");
                    None
                }
            })
            .collect();
        let count = documents.len();
        self.knowledge.write().await.extend(documents);
        debug!(path = %path.display(), count, "Knowledge loaded");
        Ok(count)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Ids of documents sharing at least one term with the query, most shared
/// terms first.
fn keyword_rank<'a>(docs: impl Iterator<Item = (usize, &'a Document)>, query: &str) -> Vec<usize> {
    let query_terms = terms(query);
    if query_terms.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, usize)> = docs
        .map(|(id, doc)| (id, terms(&doc.text).intersection(&query_terms).count()))
        .filter(|(_, hits)| *hits > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().map(|(id, _)| id).collect()
}

fn hybrid(
    docs: &[Document],
    chat_id: Option<&str>,
    query: &str,
    embedding: &[f32],
    limit: usize,
) -> Vec<RetrievedChunk> {
    let candidates = || {
        docs.iter()
            .enumerate()
            .filter(move |(_, doc)| chat_id.is_none_or(|id| doc.source_id == id))
    };

    let by_keyword = keyword_rank(candidates(), query);
    let by_vector = vector_rank(
        candidates().filter_map(|(id, doc)| doc.embedding.as_deref().map(|e| (id, e))),
        embedding,
    );

    reciprocal_rank_fusion(&[by_keyword, by_vector], RRF_K, limit)
        .into_iter()
        .map(|(id, score)| RetrievedChunk {
            text: docs[id].text.clone(),
            source_id: docs[id].source_id.clone(),
            relevance_score: score,
        })
        .collect()
}

#[async_trait]
impl HybridSearch for InMemoryHybridSearch {
    async fn search_knowledge(
        &self,
        query: &str,
        embedding: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let docs = self.knowledge.read().await;
        Ok(hybrid(&docs, None, query, embedding, options.limit))
    }

    async fn search_messages(
        &self,
        query: &str,
        embedding: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let docs = self.messages.read().await;
        Ok(hybrid(
            &docs,
            options.chat_id.as_deref(),
            query,
            embedding,
            options.limit,
        ))
    }
}
