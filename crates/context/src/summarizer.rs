//! LLM-backed conversation summarizer.
//!
//! Renders messages to a plain transcript, splits it into chunks that fit the
//! model's input budget (measured with the precise tokenizer), summarizes the
//! chunks, and merges the partial summaries when there is more than one.
//! Every call walks an ordered model list: utility model, primary model,
//! then fallbacks.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use recollect_config::SummarizerConfig;
use recollect_core::error::SummarizerError;
use recollect_core::message::{AssistantBlock, Message};
use recollect_core::provider::{Provider, ProviderRequest};
use recollect_core::summarizer::{
    SummarizeRequest, Summarizer, SummarizerCredentials, SummaryOutput,
};
use tracing::{debug, warn};

use crate::token::{CHARS_PER_TOKEN, TokenBudgetEstimator};

/// Output structure requested from the model.
pub const STRUCTURED_SUMMARY_TEMPLATE: &str = "\
Write the summary with these markdown sections, in this order:

## User Intent
## Key Decisions
## Important Context
## Actions Taken
## Open Items

Omit any section that would be empty. Preserve concrete identifiers, numbers, \
names, addresses, amounts and dates exactly as written.";

const SYSTEM_PROMPT: &str = "You summarize conversations between a user and an AI agent. \
The agent will continue the conversation from your summary alone, so keep every fact it \
would need and drop pleasantries.";

const MERGE_INSTRUCTIONS: &str = "Merge the partial summaries below into a single summary. \
Remove repetition, keep the section structure, and keep the most recent state when parts disagree.";

/// Tokens reserved for the system prompt, framing, and response formatting.
const PROMPT_OVERHEAD_TOKENS: usize = 512;

/// Below this many input tokens per chunk summarization is pointless.
const MIN_CHUNK_TOKENS: usize = 256;

/// Summarizer that drives a [`Provider`].
pub struct LlmSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
    fallback_models: Vec<String>,
    estimator: Arc<TokenBudgetEstimator>,
}

impl LlmSummarizer {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        estimator: Arc<TokenBudgetEstimator>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            fallback_models: Vec::new(),
            estimator,
        }
    }

    pub fn from_config(
        provider: Arc<dyn Provider>,
        config: &SummarizerConfig,
        estimator: Arc<TokenBudgetEstimator>,
    ) -> Self {
        Self::new(provider, config.model.clone(), estimator)
            .with_fallback_models(config.fallback_models.clone())
    }

    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }

    /// Models to try, in order, without duplicates.
    fn model_chain<'a>(&'a self, credentials: &'a SummarizerCredentials) -> Vec<&'a str> {
        let mut chain: Vec<&str> = Vec::with_capacity(self.fallback_models.len() + 2);
        let candidates = credentials
            .utility_model
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.model.as_str()))
            .chain(self.fallback_models.iter().map(String::as_str));
        for model in candidates {
            if !model.is_empty() && !chain.contains(&model) {
                chain.push(model);
            }
        }
        chain
    }

    /// One completion, trying each model until one returns text.
    ///
    /// Returns the text and the tokens it cost.
    async fn complete(
        &self,
        system_prompt: &str,
        prompt: String,
        credentials: &SummarizerCredentials,
        max_tokens: usize,
    ) -> Result<(String, usize), SummarizerError> {
        let mut last_error = String::from("no model configured");

        for model in self.model_chain(credentials) {
            let mut request = ProviderRequest::new(model, prompt.clone());
            request.system_prompt = Some(system_prompt.to_string());
            request.max_tokens = Some(u32::try_from(max_tokens).unwrap_or(u32::MAX));
            if !credentials.api_key.is_empty() {
                request.api_key = Some(credentials.api_key.clone());
            }

            match self.provider.complete(request).await {
                Ok(response) if !response.text.trim().is_empty() => {
                    let tokens = match response.usage {
                        Some(usage) => usage.total_tokens as usize,
                        None => {
                            self.estimator.estimate_tokens(system_prompt)
                                + self.estimator.estimate_tokens(&prompt)
                                + self.estimator.estimate_tokens(&response.text)
                        }
                    };
                    debug!(model = %response.model, tokens, "Summary call succeeded");
                    return Ok((response.text.trim().to_string(), tokens));
                }
                Ok(_) => {
                    warn!(model, "Model returned an empty summary, trying next");
                    last_error = format!("{model}: empty response");
                }
                Err(e) => {
                    warn!(model, error = %e, "Summary call failed, trying next model");
                    last_error = format!("{model}: {e}");
                }
            }
        }

        Err(SummarizerError::AllModelsFailed(last_error))
    }

    /// Split rendered lines into chunks of at most `budget` tokens.
    fn chunk(&self, lines: Vec<String>, budget: usize) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0;

        for line in lines {
            let mut pieces = vec![line];
            if self.estimator.estimate_tokens(&pieces[0]) > budget {
                pieces = split_chars(&pieces[0], budget * CHARS_PER_TOKEN);
            }
            for piece in pieces {
                let tokens = self.estimator.estimate_tokens(&piece);
                if current_tokens + tokens > budget && !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                    current_tokens = 0;
                }
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(&piece);
                current_tokens += tokens;
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize_with_fallback(
        &self,
        request: SummarizeRequest,
    ) -> Result<SummaryOutput, SummarizerError> {
        if request.messages.is_empty() {
            return Err(SummarizerError::EmptyInput);
        }

        let instructions = request
            .custom_instructions
            .as_deref()
            .unwrap_or(STRUCTURED_SUMMARY_TEMPLATE);
        let system_prompt = format!("{SYSTEM_PROMPT}\n\n{instructions}");

        let available = request.context_window.saturating_sub(
            request.max_summary_tokens
                + PROMPT_OVERHEAD_TOKENS
                + self.estimator.estimate_tokens(&system_prompt),
        );
        if available < MIN_CHUNK_TOKENS {
            return Err(SummarizerError::BudgetTooSmall { available });
        }

        let chunks = self.chunk(render_transcript(&request.messages), available);
        let total = chunks.len();
        debug!(
            messages = request.messages.len(),
            chunks = total,
            budget = available,
            "Summarizing conversation"
        );

        let credentials = &request.credentials;
        let system_prompt = system_prompt.as_str();
        let partials = try_join_all(chunks.into_iter().enumerate().map(|(i, chunk)| {
            let prompt = if total == 1 {
                format!("Conversation:\n\n{chunk}")
            } else {
                format!("Conversation, part {} of {total}:\n\n{chunk}", i + 1)
            };
            self.complete(system_prompt, prompt, credentials, request.max_summary_tokens)
        }))
        .await?;

        let mut tokens_used: usize = partials.iter().map(|(_, tokens)| tokens).sum();
        let summary = if total == 1 {
            partials.into_iter().map(|(text, _)| text).collect()
        } else {
            let parts = partials
                .iter()
                .enumerate()
                .map(|(i, (text, _))| format!("### Part {}\n\n{text}", i + 1))
                .collect::<Vec<_>>()
                .join("\n\n");
            let merge_system = format!("{SYSTEM_PROMPT}\n\n{MERGE_INSTRUCTIONS}\n\n{instructions}");
            let (merged, tokens) = self
                .complete(&merge_system, parts, credentials, request.max_summary_tokens)
                .await?;
            tokens_used += tokens;
            merged
        };

        if summary.trim().is_empty() {
            return Err(SummarizerError::EmptySummary);
        }

        Ok(SummaryOutput {
            summary,
            tokens_used,
            chunks_processed: total,
        })
    }
}

/// One line per message, labeled by speaker.
pub fn render_transcript(messages: &[Message]) -> Vec<String> {
    let mut lines = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            Message::User { content, .. } => lines.push(format!("User: {}", content.text())),
            Message::Assistant { content, .. } => {
                for block in content {
                    match block {
                        AssistantBlock::Text { text } if !text.is_empty() => {
                            lines.push(format!("Assistant: {text}"));
                        }
                        AssistantBlock::Text { .. } => {}
                        AssistantBlock::ToolCall {
                            id,
                            name,
                            arguments,
                        } => lines.push(format!("Assistant called {name} [{id}] with {arguments}")),
                    }
                }
            }
            Message::ToolResult {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                let label = if *is_error { "Tool error" } else { "Tool result" };
                lines.push(format!("{label} [{tool_call_id}]: {}", content.text()));
            }
        }
    }
    lines
}

fn split_chars(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenCounter;
    use recollect_core::error::{ProviderError, TokenizerError};
    use recollect_core::provider::{ProviderResponse, Usage};
    use std::collections::HashMap;
    use std::sync::Mutex;

    // ── Test helpers ───────────────────────────────────────────────────

    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> Result<usize, TokenizerError> {
            Ok(text.split_whitespace().count())
        }
    }

    fn word_estimator() -> Arc<TokenBudgetEstimator> {
        Arc::new(TokenBudgetEstimator::with_loader(|| {
            Ok(Arc::new(WordCounter) as Arc<dyn TokenCounter>)
        }))
    }

    /// Replies per model; models not listed fail with a network error.
    struct ScriptedProvider {
        replies: HashMap<&'static str, &'static str>,
        calls: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[(&'static str, &'static str)]) -> Self {
            Self {
                replies: replies.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn models_called(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.model.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let model = request.model.clone();
            self.calls.lock().unwrap().push(request);
            match self.replies.get(model.as_str()) {
                Some(text) => Ok(ProviderResponse {
                    text: text.to_string(),
                    usage: Some(Usage {
                        prompt_tokens: 90,
                        completion_tokens: 10,
                        total_tokens: 100,
                    }),
                    model,
                }),
                None => Err(ProviderError::Network(format!("{model} unreachable"))),
            }
        }
    }

    fn request(messages: Vec<Message>, context_window: usize) -> SummarizeRequest {
        SummarizeRequest {
            messages,
            credentials: SummarizerCredentials::new("sk-test"),
            context_window,
            max_summary_tokens: 200,
            custom_instructions: None,
        }
    }

    fn conversation() -> Vec<Message> {
        vec![
            Message::user("Send 5 TON to EQabc"),
            Message::tool_call(
                "call_1",
                "ton_send",
                serde_json::json!({"to": "EQabc", "amount": 5}),
            ),
            Message::tool_result("call_1", "tx 0xdeadbeef confirmed"),
            Message::assistant("Sent 5 TON, tx 0xdeadbeef."),
        ]
    }

    // ── Tests ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn single_chunk_single_call() {
        let provider = Arc::new(ScriptedProvider::new(&[("primary", "## User Intent\nSend TON")]));
        let summarizer = LlmSummarizer::new(provider.clone(), "primary", word_estimator());

        let out = summarizer
            .summarize_with_fallback(request(conversation(), 8000))
            .await
            .unwrap();
        assert_eq!(out.summary, "## User Intent\nSend TON");
        assert_eq!(out.chunks_processed, 1);
        assert_eq!(out.tokens_used, 100);

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].api_key.as_deref(), Some("sk-test"));
        assert_eq!(calls[0].max_tokens, Some(200));
        assert!(calls[0].prompt.contains("EQabc"));
        assert!(calls[0].system_prompt.as_deref().unwrap().contains("Open Items"));
    }

    #[tokio::test]
    async fn utility_model_tried_first() {
        let provider = Arc::new(ScriptedProvider::new(&[
            ("cheap", "summary"),
            ("primary", "other"),
        ]));
        let summarizer = LlmSummarizer::new(provider.clone(), "primary", word_estimator());
        let mut req = request(conversation(), 8000);
        req.credentials.utility_model = Some("cheap".into());

        let out = summarizer.summarize_with_fallback(req).await.unwrap();
        assert_eq!(out.summary, "summary");
        assert_eq!(provider.models_called(), vec!["cheap"]);
    }

    #[tokio::test]
    async fn falls_through_model_chain() {
        let provider = Arc::new(ScriptedProvider::new(&[("backup-2", "from backup")]));
        let summarizer = LlmSummarizer::new(provider.clone(), "primary", word_estimator())
            .with_fallback_models(vec!["backup-1".into(), "backup-2".into()]);
        let mut req = request(conversation(), 8000);
        req.credentials.utility_model = Some("cheap".into());

        let out = summarizer.summarize_with_fallback(req).await.unwrap();
        assert_eq!(out.summary, "from backup");
        assert_eq!(
            provider.models_called(),
            vec!["cheap", "primary", "backup-1", "backup-2"]
        );
    }

    #[tokio::test]
    async fn empty_reply_moves_to_next_model() {
        let provider = Arc::new(ScriptedProvider::new(&[("primary", "   "), ("backup", "ok")]));
        let summarizer = LlmSummarizer::new(provider.clone(), "primary", word_estimator())
            .with_fallback_models(vec!["backup".into()]);
        let out = summarizer
            .summarize_with_fallback(request(conversation(), 8000))
            .await
            .unwrap();
        assert_eq!(out.summary, "ok");
    }

    #[tokio::test]
    async fn all_models_failing_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let summarizer = LlmSummarizer::new(provider, "primary", word_estimator());
        let err = summarizer
            .summarize_with_fallback(request(conversation(), 8000))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::AllModelsFailed(msg) if msg.contains("primary")));
    }

    #[tokio::test]
    async fn empty_input_rejected() {
        let provider = Arc::new(ScriptedProvider::new(&[("primary", "x")]));
        let summarizer = LlmSummarizer::new(provider, "primary", word_estimator());
        let err = summarizer
            .summarize_with_fallback(request(vec![], 8000))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::EmptyInput));
    }

    #[tokio::test]
    async fn tiny_window_rejected() {
        let provider = Arc::new(ScriptedProvider::new(&[("primary", "x")]));
        let summarizer = LlmSummarizer::new(provider.clone(), "primary", word_estimator());
        let err = summarizer
            .summarize_with_fallback(request(conversation(), 900))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::BudgetTooSmall { .. }));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_conversation_chunked_and_merged() {
        let provider = Arc::new(ScriptedProvider::new(&[("primary", "partial or merged")]));
        let estimator = word_estimator();
        let summarizer = LlmSummarizer::new(provider.clone(), "primary", Arc::clone(&estimator));

        // Each message is 100 words; the window leaves room for a few per chunk.
        let messages: Vec<Message> = (0..12)
            .map(|i| Message::user(vec![format!("w{i}"); 100].join(" ")))
            .collect();
        let system = format!("{SYSTEM_PROMPT}\n\n{STRUCTURED_SUMMARY_TEMPLATE}");
        let window = 200 + PROMPT_OVERHEAD_TOKENS + estimator.estimate_tokens(&system) + 350;

        let out = summarizer
            .summarize_with_fallback(request(messages, window))
            .await
            .unwrap();
        assert!(out.chunks_processed > 1);

        let calls = provider.calls.lock().unwrap();
        // One call per chunk plus the merge.
        assert_eq!(calls.len(), out.chunks_processed + 1);
        assert_eq!(out.tokens_used, 100 * calls.len());
        let merge = calls.last().unwrap();
        assert!(merge.prompt.contains("### Part 1"));
        assert!(merge.system_prompt.as_deref().unwrap().contains("Merge the partial summaries"));
        for call in &calls[..calls.len() - 1] {
            assert!(estimator.estimate_tokens(&call.prompt) <= 350 + 8);
        }
    }

    #[test]
    fn transcript_labels_speakers() {
        let lines = render_transcript(&conversation());
        assert_eq!(lines[0], "User: Send 5 TON to EQabc");
        assert!(lines[1].starts_with("Assistant called ton_send [call_1] with"));
        assert_eq!(lines[2], "Tool result [call_1]: tx 0xdeadbeef confirmed");
        assert_eq!(lines[3], "Assistant: Sent 5 TON, tx 0xdeadbeef.");
    }

    #[test]
    fn model_chain_deduplicates() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let summarizer = LlmSummarizer::new(provider, "primary", word_estimator())
            .with_fallback_models(vec!["primary".into(), "backup".into()]);
        let mut creds = SummarizerCredentials::new("k");
        creds.utility_model = Some("primary".into());
        assert_eq!(summarizer.model_chain(&creds), vec!["primary", "backup"]);
    }

    #[test]
    fn oversized_line_split() {
        let pieces = split_chars("abcdefghij", 4);
        assert_eq!(pieces, vec!["abcd", "efgh", "ij"]);
    }
}
