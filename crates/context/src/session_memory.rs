//! Session-memory extraction before compaction.
//!
//! Writes one markdown file per superseded session:
//! `<dir>/YYYY-MM-DD-<old_session_id>.md`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use recollect_core::error::{Error, StorageError};
use recollect_core::summarizer::{
    SessionMemoryHook, SessionMemoryRequest, SummarizeRequest, Summarizer,
};
use tracing::{debug, info};

use crate::compaction::SummaryBudget;

const SESSION_MEMORY_INSTRUCTIONS: &str = "\
Extract what is worth remembering after this session ends. Use these markdown sections:

## Facts
## Preferences
## Decisions
## Open Items

Omit empty sections. Keep identifiers, numbers, names and dates exactly as written. \
Skip small talk and anything only relevant to this session.";

/// Summarizes a full session into a dated markdown file.
pub struct SessionMemoryWriter {
    summarizer: Arc<dyn Summarizer>,
    dir: PathBuf,
    budget: SummaryBudget,
}

impl SessionMemoryWriter {
    pub fn new(summarizer: Arc<dyn Summarizer>, dir: impl Into<PathBuf>) -> Self {
        Self {
            summarizer,
            dir: dir.into(),
            budget: SummaryBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: SummaryBudget) -> Self {
        self.budget = budget;
        self
    }
}

#[async_trait]
impl SessionMemoryHook for SessionMemoryWriter {
    async fn save_session_memory(&self, request: SessionMemoryRequest<'_>) -> Result<(), Error> {
        if request.context.messages.is_empty() {
            debug!(session_id = %request.old_session_id, "Empty session, no memory to save");
            return Ok(());
        }

        let output = self
            .summarizer
            .summarize_with_fallback(SummarizeRequest {
                messages: request.context.messages.clone(),
                credentials: request.credentials.clone(),
                context_window: self.budget.context_window,
                max_summary_tokens: self.budget.max_summary_tokens,
                custom_instructions: Some(SESSION_MEMORY_INSTRUCTIONS.to_string()),
            })
            .await?;

        let now = Utc::now();
        let date = now.format("%Y-%m-%d");
        let path = self
            .dir
            .join(format!("{date}-{}.md", request.old_session_id));
        let body = format!(
            "# Session memory {date}\n\n\
             - **Chat**: {}\n\
             - **Session**: {}\n\
             - **Continued as**: {}\n\
             - **Saved at**: {}\n\n\
             {}\n",
            request.chat_id,
            request.old_session_id,
            request.new_session_id,
            now.to_rfc3339(),
            output.summary.trim()
        );

        let io_err = |e: std::io::Error| StorageError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        tokio::fs::write(&path, body).await.map_err(io_err)?;

        info!(
            session_id = %request.old_session_id,
            chat_id = request.chat_id,
            path = %path.display(),
            "Session memory saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recollect_core::error::SummarizerError;
    use recollect_core::message::{Context, Message};
    use recollect_core::session::SessionId;
    use recollect_core::summarizer::{SummarizerCredentials, SummaryOutput};
    use std::sync::Mutex;

    struct FixedSummarizer {
        reply: Option<&'static str>,
        instructions: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize_with_fallback(
            &self,
            request: SummarizeRequest,
        ) -> Result<SummaryOutput, SummarizerError> {
            self.instructions
                .lock()
                .unwrap()
                .push(request.custom_instructions);
            match self.reply {
                Some(text) => Ok(SummaryOutput {
                    summary: text.into(),
                    tokens_used: 10,
                    chunks_processed: 1,
                }),
                None => Err(SummarizerError::AllModelsFailed("offline".into())),
            }
        }
    }

    fn summarizer(reply: Option<&'static str>) -> Arc<FixedSummarizer> {
        Arc::new(FixedSummarizer {
            reply,
            instructions: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn writes_dated_markdown_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("memory").join("sessions");
        let fixed = summarizer(Some("## Facts\n- wallet EQabc"));
        let writer = SessionMemoryWriter::new(fixed.clone(), &dir);

        let old = SessionId::from("old-1");
        let new = SessionId::from("new-2");
        let context = Context::new(vec![Message::user("my wallet is EQabc")]);
        let creds = SummarizerCredentials::new("k");

        writer
            .save_session_memory(SessionMemoryRequest {
                old_session_id: &old,
                new_session_id: &new,
                context: &context,
                chat_id: "chat_7",
                credentials: &creds,
            })
            .await
            .unwrap();

        let expected = dir.join(format!("{}-old-1.md", Utc::now().format("%Y-%m-%d")));
        let body = std::fs::read_to_string(expected).unwrap();
        assert!(body.contains("**Chat**: chat_7"));
        assert!(body.contains("**Continued as**: new-2"));
        assert!(body.contains("- wallet EQabc"));

        let seen = fixed.instructions.lock().unwrap();
        assert!(seen[0].as_deref().unwrap().contains("## Preferences"));
    }

    #[tokio::test]
    async fn empty_session_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let fixed = summarizer(Some("x"));
        let writer = SessionMemoryWriter::new(fixed.clone(), tmp.path());
        let id = SessionId::from("s");
        let context = Context::default();
        let creds = SummarizerCredentials::default();

        writer
            .save_session_memory(SessionMemoryRequest {
                old_session_id: &id,
                new_session_id: &id,
                context: &context,
                chat_id: "c",
                credentials: &creds,
            })
            .await
            .unwrap();
        assert!(fixed.instructions.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn summarizer_failure_surfaces() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = SessionMemoryWriter::new(summarizer(None), tmp.path());
        let id = SessionId::from("s");
        let context = Context::new(vec![Message::user("hi")]);
        let creds = SummarizerCredentials::default();

        let err = writer
            .save_session_memory(SessionMemoryRequest {
                old_session_id: &id,
                new_session_id: &id,
                context: &context,
                chat_id: "c",
                credentials: &creds,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Summarizer(_)));
    }
}
