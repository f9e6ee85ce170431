//! LLM provider implementations for recollect.
//!
//! All providers implement the `recollect_core::Provider` trait and are used
//! for summarization and query embeddings.

pub mod fallback;
pub mod openai_compat;

pub use fallback::FallbackProvider;
pub use openai_compat::OpenAiCompatProvider;
