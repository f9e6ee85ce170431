//! Per-turn context builder.
//!
//! Blends three sources into the input for one LLM call:
//!
//! 1. **Recent dialogue**: the last N stored turns of this chat, verbatim
//! 2. **Knowledge**: long-term memory hits, reordered edges-first
//! 3. **Feed**: older chat excerpts relevant to the query, deduplicated
//!    against recent dialogue and truncated
//!
//! The query embedding is computed once and shared by every search. Each
//! source degrades to empty on failure; a failing dependency never fails the
//! build.

use std::collections::HashSet;
use std::sync::Arc;

use recollect_config::ContextConfig;
use recollect_core::error::SearchError;
use recollect_core::search::{EmbeddingProvider, HybridSearch, RetrievedChunk, SearchOptions};
use recollect_core::store::{MessageStore, StoredMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fallback::or_fallback;
use crate::reorder::reorder_for_edges;
use crate::token::CHARS_PER_TOKEN;

/// Default cap on a single feed excerpt, in characters.
pub const FEED_MESSAGE_MAX_CHARS: usize = 2000;

const TRUNCATION_SUFFIX: &str = "... [truncated]";

// ── Types ─────────────────────────────────────────────────────────────────

/// Who sent a recent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A recent chat turn, as handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMessage {
    pub role: Role,
    pub content: String,
}

impl From<StoredMessage> for RecentMessage {
    fn from(stored: StoredMessage) -> Self {
        Self {
            role: if stored.is_from_agent {
                Role::Assistant
            } else {
                Role::User
            },
            content: stored.text,
        }
    }
}

/// Inputs for one build.
#[derive(Debug, Clone)]
pub struct BuildContextOptions {
    pub query: String,
    pub chat_id: String,
    pub include_agent_memory: bool,
    pub include_feed_history: bool,
    pub search_all_chats: bool,
    pub max_recent_messages: usize,
    pub max_relevant_chunks: usize,
    /// Reuse an embedding the caller already computed
    pub query_embedding: Option<Vec<f32>>,
}

impl BuildContextOptions {
    pub fn new(query: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            chat_id: chat_id.into(),
            include_agent_memory: true,
            include_feed_history: true,
            search_all_chats: false,
            max_recent_messages: 20,
            max_relevant_chunks: 5,
            query_embedding: None,
        }
    }

    /// Defaults taken from configuration.
    pub fn from_config(
        query: impl Into<String>,
        chat_id: impl Into<String>,
        config: &ContextConfig,
    ) -> Self {
        Self {
            max_recent_messages: config.max_recent_messages,
            max_relevant_chunks: config.max_relevant_chunks,
            ..Self::new(query, chat_id)
        }
    }
}

/// The assembled turn input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuiltContext {
    pub recent_messages: Vec<RecentMessage>,
    pub relevant_knowledge: Vec<String>,
    pub relevant_feed: Vec<String>,
    pub estimated_tokens: usize,
}

// ── Builder ───────────────────────────────────────────────────────────────

/// Builds per-turn context. Holds no per-turn state, so one instance serves every turn.
pub struct ContextBuilder {
    messages: Arc<dyn MessageStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    search: Arc<dyn HybridSearch>,
    feed_message_max_chars: usize,
}

impl ContextBuilder {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        search: Arc<dyn HybridSearch>,
    ) -> Self {
        Self {
            messages,
            embedder,
            search,
            feed_message_max_chars: FEED_MESSAGE_MAX_CHARS,
        }
    }

    pub fn with_feed_message_max_chars(mut self, max_chars: usize) -> Self {
        self.feed_message_max_chars = max_chars;
        self
    }

    /// Assemble recent dialogue, knowledge, and feed for one turn.
    pub async fn build_context(&self, options: BuildContextOptions) -> BuiltContext {
        let wants_search = options.include_agent_memory || options.include_feed_history;
        let embedding = match options.query_embedding.clone() {
            Some(embedding) => embedding,
            None if wants_search => self.embed_query(&options.query).await,
            None => Vec::new(),
        };

        // ── Recent dialogue ────────────────────────────────────────────────
        let stored = or_fallback(
            self.messages
                .get_recent_messages(&options.chat_id, options.max_recent_messages)
                .await,
            |e| {
                warn!(chat_id = %options.chat_id, error = %e, "Recent messages unavailable");
                Vec::new()
            },
        )
        .into_inner();
        let recent_messages: Vec<RecentMessage> =
            stored.into_iter().map(RecentMessage::from).collect();

        // ── Knowledge and chat-scoped feed (independent, run together) ─────
        let limit = options.max_relevant_chunks;
        let knowledge_search = async {
            if !options.include_agent_memory {
                return Vec::new();
            }
            let hits = self
                .search
                .search_knowledge(&options.query, &embedding, SearchOptions::limit(limit))
                .await;
            let texts = or_fallback(hits, |e| {
                warn!(error = %e, "Knowledge search failed, continuing without it");
                Vec::new()
            })
            .into_inner()
            .into_iter()
            .map(|chunk| chunk.text)
            .collect();
            reorder_for_edges(texts)
        };
        let feed_search = async {
            if !options.include_feed_history {
                return None;
            }
            Some(
                self.search
                    .search_messages(
                        &options.query,
                        &embedding,
                        SearchOptions::in_chat(options.chat_id.clone(), limit),
                    )
                    .await,
            )
        };
        let (relevant_knowledge, scoped_hits) = futures::join!(knowledge_search, feed_search);

        // ── Feed ───────────────────────────────────────────────────────────
        let mut relevant_feed = Vec::new();
        if let Some(scoped_hits) = scoped_hits {
            relevant_feed = self
                .collect_feed(&options, &embedding, &recent_messages, scoped_hits)
                .await;
        }

        let mut built = BuiltContext {
            recent_messages,
            relevant_knowledge,
            relevant_feed,
            estimated_tokens: 0,
        };
        built.estimated_tokens = estimate_built_tokens(&built);

        debug!(
            chat_id = %options.chat_id,
            recent = built.recent_messages.len(),
            knowledge = built.relevant_knowledge.len(),
            feed = built.relevant_feed.len(),
            tokens = built.estimated_tokens,
            "Context built"
        );
        built
    }

    async fn embed_query(&self, query: &str) -> Vec<f32> {
        or_fallback(self.embedder.embed_query(query).await, |e| {
            warn!(
                embedder = self.embedder.name(),
                error = %e,
                "Query embedding failed, searching by keyword only"
            );
            Vec::new()
        })
        .into_inner()
    }

    async fn collect_feed(
        &self,
        options: &BuildContextOptions,
        embedding: &[f32],
        recent: &[RecentMessage],
        scoped_hits: Result<Vec<RetrievedChunk>, SearchError>,
    ) -> Vec<String> {
        let recent_texts: HashSet<&str> = recent
            .iter()
            .map(|m| m.content.as_str())
            .filter(|text| !text.is_empty())
            .collect();

        let scoped = or_fallback(scoped_hits, |e| {
            warn!(chat_id = %options.chat_id, error = %e, "Feed search failed");
            Vec::new()
        });
        let scoped_came_up_empty = scoped.is_fallback() || scoped.value().is_empty();

        let mut feed = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for hit in scoped.into_inner() {
            if recent_texts.contains(hit.text.as_str()) {
                continue;
            }
            let text = truncate_feed_text(&hit.text, self.feed_message_max_chars);
            if seen.insert(text.clone()) {
                feed.push(text);
            }
        }

        if options.search_all_chats {
            let global = self
                .search
                .search_messages(
                    &options.query,
                    embedding,
                    SearchOptions::limit(options.max_relevant_chunks),
                )
                .await;
            let global = or_fallback(global, |e| {
                warn!(error = %e, "Cross-chat feed search failed");
                Vec::new()
            })
            .into_inner();

            for hit in global {
                if recent_texts.contains(hit.text.as_str()) {
                    continue;
                }
                let text = truncate_feed_text(&hit.text, self.feed_message_max_chars);
                if !seen.insert(text.clone()) {
                    continue;
                }
                if hit.source_id == options.chat_id {
                    feed.push(text);
                } else {
                    feed.push(format!("[From chat {}]: {}", hit.source_id, text));
                }
            }
        }

        if feed.is_empty() && scoped_came_up_empty && !recent.is_empty() {
            debug!(chat_id = %options.chat_id, "Feed empty, falling back to recent history");
            feed = recent_feed_fallback(recent, options.max_relevant_chunks);
        }

        feed
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Cut `text` to `max_chars` characters, marking the cut.
pub fn truncate_feed_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_SUFFIX),
        None => text.to_string(),
    }
}

/// The last `limit` non-empty recent messages, labeled by sender.
fn recent_feed_fallback(recent: &[RecentMessage], limit: usize) -> Vec<String> {
    let labeled: Vec<String> = recent
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| match m.role {
            Role::Assistant => format!("[Agent]: {}", m.content),
            Role::User => format!("[User]: {}", m.content),
        })
        .collect();
    let skip = labeled.len().saturating_sub(limit);
    labeled.into_iter().skip(skip).collect()
}

fn estimate_built_tokens(built: &BuiltContext) -> usize {
    let chars: usize = built
        .recent_messages
        .iter()
        .map(|m| m.content.chars().count())
        .chain(built.relevant_knowledge.iter().map(|t| t.chars().count()))
        .chain(built.relevant_feed.iter().map(|t| t.chars().count()))
        .sum();
    chars.div_ceil(CHARS_PER_TOKEN)
}
