//! Error types for the recollect domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error variant.

use thiserror::Error;

/// The top-level error type for all recollect operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Storage errors (transcripts, chat logs, daily log) ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Retrieval errors ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Summarization errors ---
    #[error("Summarizer error: {0}")]
    Summarizer(#[from] SummarizerError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tokenizer errors ---
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O failed on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Corrupted record in {path}: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding model unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding generation failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Error)]
pub enum SummarizerError {
    #[error("Nothing to summarize")]
    EmptyInput,

    #[error("Summary budget too small: {available} tokens available for input")]
    BudgetTooSmall { available: usize },

    #[error("All models failed, last error: {0}")]
    AllModelsFailed(String),

    #[error("Summarizer timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Summarizer returned an empty summary")]
    EmptySummary,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("Tokenizer failed to load: {0}")]
    LoadFailed(String),

    #[error("Encoding failed: {0}")]
    EncodeFailed(String),
}
