//! Conversation compaction.
//!
//! Once a conversation crosses its budget the oldest messages are replaced by
//! a single summary message. The cut point is chosen so that no tool result
//! in the kept suffix loses the tool call it answers; if no such point can be
//! found the context is left alone.
//!
//! Per session the lifecycle is:
//!
//! ```text
//! Active ──soft threshold──▶ Active+Flushed ──hard threshold──▶ Compacting ──▶ Active (new id)
//!                                                                   │
//!                                                                   └─ no clean cut ─▶ Active (same id)
//! ```

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use recollect_config::{CompactionConfig, CompactionConfigPatch, SummarizerConfig};
use recollect_core::error::{Result, SummarizerError};
use recollect_core::message::{Context, Message};
use recollect_core::session::SessionId;
use recollect_core::store::{DailyLog, TranscriptStore};
use recollect_core::summarizer::{
    SessionMemoryHook, SessionMemoryRequest, SummarizeRequest, Summarizer, SummarizerCredentials,
};
use tracing::{debug, error, info, warn};

use crate::fallback::or_fallback;
use crate::flush::format_memory_flush;
use crate::summarizer::STRUCTURED_SUMMARY_TEMPLATE;
use crate::token::{TokenBudgetEstimator, estimate_context_tokens};

/// Upper bound on clean-cut search steps.
pub const MAX_CLEAN_CUT_ITERATIONS: usize = 50;

// ── Threshold checks ──────────────────────────────────────────────────────

/// Whether the soft threshold for a memory flush has been reached.
///
/// `token_count` reuses an estimate the caller already has.
pub fn should_flush_memory(
    context: &Context,
    config: &CompactionConfig,
    token_count: Option<usize>,
) -> bool {
    if !config.enabled || !config.flush_enabled() {
        return false;
    }
    let Some(soft) = config.soft_threshold_tokens else {
        return false;
    };
    token_count.unwrap_or_else(|| estimate_context_tokens(context)) >= soft
}

/// Whether the hard message or token limit has been reached.
pub fn should_compact(
    context: &Context,
    config: &CompactionConfig,
    token_count: Option<usize>,
) -> bool {
    if !config.enabled {
        return false;
    }
    if config
        .max_messages
        .is_some_and(|max| context.messages.len() >= max)
    {
        return true;
    }
    config
        .max_tokens
        .is_some_and(|max| token_count.unwrap_or_else(|| estimate_context_tokens(context)) >= max)
}

// ── Clean cut ─────────────────────────────────────────────────────────────

/// True if some tool result in `suffix` answers a call outside it.
pub fn has_orphaned_tool_result(suffix: &[Message]) -> bool {
    let calls: HashSet<&str> = suffix.iter().flat_map(Message::tool_call_ids).collect();
    suffix
        .iter()
        .filter_map(Message::answered_tool_call)
        .any(|id| !calls.contains(id))
}

/// Walk `initial` backwards until `messages[cut..]` holds no orphaned tool
/// result.
///
/// Returns `None` if no clean cut is found within
/// [`MAX_CLEAN_CUT_ITERATIONS`] steps.
pub fn find_clean_cut(messages: &[Message], initial: usize) -> Option<usize> {
    let mut cut = initial.min(messages.len());
    for _ in 0..MAX_CLEAN_CUT_ITERATIONS {
        if !has_orphaned_tool_result(&messages[cut..]) {
            return Some(cut);
        }
        if cut == 0 {
            return None;
        }
        cut -= 1;
    }
    (!has_orphaned_tool_result(&messages[cut..])).then_some(cut)
}

fn summary_text(removed: usize, summary: &str) -> String {
    format!("[Auto-compacted {removed} messages]\n\n{summary}")
}

fn fallback_summary_text(removed: usize) -> String {
    format!("[Auto-compacted: {removed} earlier messages from this conversation]")
}

// ── Manager ───────────────────────────────────────────────────────────────

/// Collaborators the manager drives.
pub struct CompactionDeps {
    pub summarizer: Arc<dyn Summarizer>,
    pub transcripts: Arc<dyn TranscriptStore>,
    pub daily_log: Arc<dyn DailyLog>,
    /// Runs before old messages are discarded
    pub session_memory: Option<Arc<dyn SessionMemoryHook>>,
}

/// Limits handed to the summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryBudget {
    pub context_window: usize,
    pub max_summary_tokens: usize,
    pub timeout: Duration,
}

impl SummaryBudget {
    pub fn from_config(config: &SummarizerConfig) -> Self {
        Self {
            context_window: config.context_window,
            max_summary_tokens: config.max_summary_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for SummaryBudget {
    fn default() -> Self {
        Self::from_config(&SummarizerConfig::default())
    }
}

/// Decides when to flush and when to compact, and carries both out.
///
/// Construct one at startup and share it; the config can be updated while
/// other sessions are running, and each pass works on a snapshot.
pub struct CompactionManager {
    config: RwLock<CompactionConfig>,
    estimator: Arc<TokenBudgetEstimator>,
    deps: CompactionDeps,
    budget: SummaryBudget,
}

impl CompactionManager {
    pub fn new(
        config: CompactionConfig,
        estimator: Arc<TokenBudgetEstimator>,
        deps: CompactionDeps,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            estimator,
            deps,
            budget: SummaryBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: SummaryBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Snapshot of the current config.
    pub fn config(&self) -> CompactionConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Shallow-merge `patch` into the current config.
    pub fn update_config(&self, patch: CompactionConfigPatch) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.apply(patch);
        debug!(config = ?*config, "Compaction config updated");
    }

    pub fn estimator(&self) -> &TokenBudgetEstimator {
        &self.estimator
    }

    /// Replace all but the most recent messages with a summary.
    ///
    /// Returns `context` untouched when it is within `keep_recent_messages`
    /// or when no clean cut exists. A failing or slow summarizer yields a
    /// plain placeholder summary rather than an error.
    pub async fn compact_context(
        &self,
        context: Context,
        config: &CompactionConfig,
        credentials: &SummarizerCredentials,
    ) -> Context {
        let Some(cut) = plan_cut(&context, config) else {
            return context;
        };

        let Context {
            system_prompt,
            messages: mut old,
        } = context;
        let recent = old.split_off(cut);
        let removed = old.len();
        let first_timestamp = old.first().map(Message::timestamp).unwrap_or_else(chrono::Utc::now);

        let request = SummarizeRequest {
            messages: old,
            credentials: credentials.clone(),
            context_window: self.budget.context_window,
            max_summary_tokens: self.budget.max_summary_tokens,
            custom_instructions: Some(STRUCTURED_SUMMARY_TEMPLATE.to_string()),
        };
        let outcome = match tokio::time::timeout(
            self.budget.timeout,
            self.deps.summarizer.summarize_with_fallback(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SummarizerError::Timeout {
                timeout_secs: self.budget.timeout.as_secs(),
            }),
        };

        let summary = or_fallback(
            outcome.map(|output| {
                debug!(
                    tokens_used = output.tokens_used,
                    chunks = output.chunks_processed,
                    "Summary generated"
                );
                summary_text(removed, &output.summary)
            }),
            |e| {
                error!(error = %e, removed, "Summarization failed, using placeholder summary");
                fallback_summary_text(removed)
            },
        )
        .into_inner();

        let mut messages = Vec::with_capacity(recent.len() + 1);
        messages.push(Message::user(summary).with_timestamp(first_timestamp));
        messages.extend(recent);

        Context {
            system_prompt,
            messages,
        }
    }

    /// Compact `context` into a fresh session and write its transcript.
    ///
    /// With a `chat_id`, the session-memory hook sees the full context before
    /// anything is discarded. Returns the new session id.
    pub async fn compact_and_save_transcript(
        &self,
        session_id: &SessionId,
        context: Context,
        config: &CompactionConfig,
        credentials: &SummarizerCredentials,
        chat_id: Option<&str>,
    ) -> Result<SessionId> {
        let new_session_id = SessionId::new();

        if let (Some(chat_id), Some(hook)) = (chat_id, &self.deps.session_memory) {
            let request = SessionMemoryRequest {
                old_session_id: session_id,
                new_session_id: &new_session_id,
                context: &context,
                chat_id,
                credentials,
            };
            if let Err(e) = hook.save_session_memory(request).await {
                warn!(session_id = %session_id, error = %e, "Session memory extraction failed");
            }
        }

        let before = context.messages.len();
        let compacted = self.compact_context(context, config, credentials).await;

        for message in &compacted.messages {
            self.deps
                .transcripts
                .append_to_transcript(&new_session_id, message)
                .await?;
        }

        info!(
            old_session = %session_id,
            new_session = %new_session_id,
            before,
            after = compacted.messages.len(),
            "Session compacted"
        );
        Ok(new_session_id)
    }

    /// Per-turn entry point.
    ///
    /// Flushes a recovery summary once the soft threshold is crossed, and
    /// compacts once the hard limit is reached. Returns the new session id
    /// when compaction happened.
    pub async fn check_and_compact(
        &self,
        session_id: &SessionId,
        context: &Context,
        credentials: &SummarizerCredentials,
        chat_id: Option<&str>,
    ) -> Result<Option<SessionId>> {
        let config = self.config();
        let tokens = self.estimator.estimate_context_tokens(context);

        let mut flushed = false;
        if should_flush_memory(context, &config, Some(tokens)) {
            self.flush_memory(session_id, context, tokens).await;
            flushed = true;
        }

        if !should_compact(context, &config, Some(tokens)) {
            return Ok(None);
        }

        if plan_cut(context, &config).is_none() {
            return Ok(None);
        }

        if !flushed && config.flush_enabled() {
            self.flush_memory(session_id, context, tokens).await;
        }

        let new_session_id = self
            .compact_and_save_transcript(session_id, context.clone(), &config, credentials, chat_id)
            .await?;
        Ok(Some(new_session_id))
    }

    async fn flush_memory(&self, session_id: &SessionId, context: &Context, tokens: usize) {
        let text = format_memory_flush(session_id, context, tokens);
        match self.deps.daily_log.write_summary(&text).await {
            Ok(()) => debug!(session_id = %session_id, tokens, "Memory flushed to daily log"),
            Err(e) => warn!(session_id = %session_id, error = %e, "Memory flush failed"),
        }
    }
}

/// Where to split `context`, or `None` if compaction would be a no-op.
fn plan_cut(context: &Context, config: &CompactionConfig) -> Option<usize> {
    let keep = config.keep_recent();
    let len = context.messages.len();
    if len <= keep {
        return None;
    }
    match find_clean_cut(&context.messages, len - keep) {
        Some(0) => {
            debug!(messages = len, "Clean cut reached the first message, nothing to compact");
            None
        }
        Some(cut) => Some(cut),
        None => {
            warn!(
                messages = len,
                keep,
                "No clean cut point within {MAX_CLEAN_CUT_ITERATIONS} steps, skipping compaction"
            );
            None
        }
    }
}
