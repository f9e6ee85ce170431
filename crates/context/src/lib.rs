//! Conversation context lifecycle for recollect.
//!
//! - [`TokenBudgetEstimator`] counts tokens, precisely or by heuristic
//! - [`ContextBuilder`] assembles each turn's input from recent dialogue,
//!   long-term knowledge and older chat excerpts
//! - [`CompactionManager`] flushes recovery notes and compacts conversations
//!   that outgrow their budget, without splitting tool calls from results

pub mod builder;
pub mod compaction;
pub mod fallback;
pub mod flush;
pub mod reorder;
pub mod session_memory;
pub mod summarizer;
pub mod token;

pub use builder::{
    BuildContextOptions, BuiltContext, ContextBuilder, FEED_MESSAGE_MAX_CHARS, RecentMessage, Role,
};
pub use compaction::{
    CompactionDeps, CompactionManager, MAX_CLEAN_CUT_ITERATIONS, SummaryBudget, find_clean_cut,
    should_compact, should_flush_memory,
};
pub use fallback::{Fallible, or_fallback};
pub use flush::format_memory_flush;
pub use reorder::reorder_for_edges;
pub use session_memory::SessionMemoryWriter;
pub use summarizer::{LlmSummarizer, STRUCTURED_SUMMARY_TEMPLATE};
pub use token::{TokenBudgetEstimator, TokenCounter, heuristic_tokens};
