//! Reference collaborators for recollect: stores, daily log, hybrid search
//! and embedders.

pub mod daily_log;
pub mod embedding;
pub mod file_store;
pub mod in_memory;
pub mod noop;
pub mod search;
pub mod vector;

pub use daily_log::FileDailyLog;
pub use embedding::{ProviderEmbedder, WARMUP_ATTEMPTS, WarmupEmbedder};
pub use file_store::{FileMessageStore, FileTranscriptStore};
pub use in_memory::{InMemoryMessageStore, InMemoryTranscriptStore};
pub use noop::NoopEmbedder;
pub use search::{Document, InMemoryHybridSearch};
pub use vector::{RRF_K, cosine_similarity, reciprocal_rank_fusion, vector_rank};
