//! # recollect core
//!
//! Domain types, collaborator traits, and error definitions for the
//! recollect conversation-context lifecycle manager.
//! This crate performs **no I/O**. It defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external capability (message storage, search, embeddings,
//! summarization, transcripts, daily logs, session memory) is a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod search;
pub mod session;
pub mod store;
pub mod summarizer;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{AssistantBlock, Context, Message, MessageContent, TextBlock};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use search::{EmbeddingProvider, HybridSearch, RetrievedChunk, SearchOptions};
pub use session::{Session, SessionId};
pub use store::{DailyLog, MessageStore, StoredMessage, TranscriptStore};
pub use summarizer::{
    SessionMemoryHook, SessionMemoryRequest, SummarizeRequest, Summarizer,
    SummarizerCredentials, SummaryOutput,
};
