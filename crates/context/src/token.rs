//! Token estimation.
//!
//! Two fidelities:
//! - a character heuristic (~4 characters per token, rounded up) that is cheap
//!   enough to run on every turn for threshold checks;
//! - a precise count from the `cl100k_base` BPE (GPT-4 family), loaded lazily
//!   once per estimator and used where exact budgeting matters, such as
//!   sizing summarizer input chunks.
//!
//! The precise path never fails the caller: if the tokenizer cannot load or
//! encode, the heuristic answers instead.

use std::sync::{Arc, OnceLock};

use recollect_core::error::TokenizerError;
use recollect_core::message::{AssistantBlock, Context, Message};
use tracing::{debug, warn};

use crate::fallback::or_fallback;

pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn heuristic_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Characters the threshold heuristic counts for one message.
///
/// User text and assistant text blocks count; tool-call blocks and tool
/// results do not.
pub fn counted_chars(message: &Message) -> usize {
    match message {
        Message::User { content, .. } => content.char_len(),
        Message::Assistant { content, .. } => content
            .iter()
            .map(|block| match block {
                AssistantBlock::Text { text } => text.chars().count(),
                AssistantBlock::ToolCall { .. } => 0,
            })
            .sum(),
        Message::ToolResult { .. } => 0,
    }
}

/// Cheap token estimate for a whole context.
///
/// Sums the system prompt and [`counted_chars`] of every message, then
/// divides by four rounding up.
pub fn estimate_context_tokens(context: &Context) -> usize {
    let system = context
        .system_prompt
        .as_deref()
        .map_or(0, |prompt| prompt.chars().count());
    let messages: usize = context.messages.iter().map(counted_chars).sum();
    (system + messages).div_ceil(CHARS_PER_TOKEN)
}

/// Something that can count tokens exactly.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, TokenizerError>;
}

struct Cl100kCounter(tiktoken_rs::CoreBPE);

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.0.encode_ordinary(text).len())
    }
}

/// Load the GPT-4 family `cl100k_base` encoding.
pub fn load_cl100k() -> Result<Arc<dyn TokenCounter>, TokenizerError> {
    let bpe = tiktoken_rs::cl100k_base().map_err(|e| TokenizerError::LoadFailed(e.to_string()))?;
    Ok(Arc::new(Cl100kCounter(bpe)))
}

type CounterLoader = Box<dyn Fn() -> Result<Arc<dyn TokenCounter>, TokenizerError> + Send + Sync>;

/// Token estimator owning a lazily-loaded tokenizer.
///
/// Construct one at startup and share it by reference. The tokenizer loads on
/// first precise call; later calls read it without locking.
pub struct TokenBudgetEstimator {
    loader: CounterLoader,
    counter: OnceLock<Result<Arc<dyn TokenCounter>, TokenizerError>>,
}

impl TokenBudgetEstimator {
    /// Estimator backed by `cl100k_base`.
    pub fn new() -> Self {
        Self::with_loader(load_cl100k)
    }

    /// Estimator with a custom tokenizer loader.
    pub fn with_loader(
        loader: impl Fn() -> Result<Arc<dyn TokenCounter>, TokenizerError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            loader: Box::new(loader),
            counter: OnceLock::new(),
        }
    }

    fn counter(&self) -> Result<&Arc<dyn TokenCounter>, TokenizerError> {
        self.counter
            .get_or_init(|| {
                let loaded = (self.loader)();
                match &loaded {
                    Ok(_) => debug!("Tokenizer loaded"),
                    Err(e) => warn!(error = %e, "Tokenizer unavailable, using character heuristic"),
                }
                loaded
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Exact token count, or the tokenizer's error.
    pub fn precise_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        self.counter()?.count(text)
    }

    /// Token count for `text`: precise when possible, heuristic otherwise.
    pub fn estimate_tokens(&self, text: &str) -> usize {
        or_fallback(self.precise_tokens(text), |e| {
            if let TokenizerError::EncodeFailed(_) = e {
                warn!(error = %e, "Token encoding failed, using character heuristic");
            }
            heuristic_tokens(text)
        })
        .into_inner()
    }

    /// Cheap estimate for threshold checks. See [`estimate_context_tokens`].
    pub fn estimate_context_tokens(&self, context: &Context) -> usize {
        estimate_context_tokens(context)
    }
}

impl Default for TokenBudgetEstimator {
    fn default() -> Self {
        Self::new()
    }
}
