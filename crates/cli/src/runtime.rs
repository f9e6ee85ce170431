//! Wires configuration to concrete collaborators.

use std::sync::Arc;

use anyhow::Context as _;
use recollect_config::AppConfig;
use recollect_context::{
    CompactionDeps, CompactionManager, ContextBuilder, LlmSummarizer, SessionMemoryWriter,
    SummaryBudget, TokenBudgetEstimator,
};
use recollect_core::{
    EmbeddingProvider, Provider, SessionMemoryHook, Summarizer, SummarizerCredentials,
};
use recollect_memory::{
    FileDailyLog, FileMessageStore, FileTranscriptStore, InMemoryHybridSearch, NoopEmbedder,
    ProviderEmbedder, WarmupEmbedder,
};
use recollect_providers::FallbackProvider;
use tracing::{debug, info};

pub struct Runtime {
    pub config: AppConfig,
    pub estimator: Arc<TokenBudgetEstimator>,
    pub chats: Arc<FileMessageStore>,
    pub transcripts: Arc<FileTranscriptStore>,
    provider: Arc<FallbackProvider>,
}

impl Runtime {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let provider = FallbackProvider::from_config(&config.summarizer)
            .context("Failed to create summarizer provider")?;
        let storage = &config.storage;

        debug!(
            data_dir = %storage.data_dir().display(),
            endpoints = ?provider.endpoints(),
            "Runtime initialized"
        );

        Ok(Self {
            estimator: Arc::new(TokenBudgetEstimator::new()),
            chats: Arc::new(FileMessageStore::new(storage.chats_dir())),
            transcripts: Arc::new(FileTranscriptStore::new(storage.sessions_dir())),
            provider: Arc::new(provider),
            config,
        })
    }

    pub fn credentials(&self) -> SummarizerCredentials {
        let summarizer = &self.config.summarizer;
        SummarizerCredentials {
            api_key: summarizer.api_key.clone().unwrap_or_default(),
            provider: Some(summarizer.provider.clone()),
            utility_model: summarizer.utility_model.clone(),
        }
    }

    pub fn compaction_manager(&self) -> CompactionManager {
        let storage = &self.config.storage;
        let budget = SummaryBudget::from_config(&self.config.summarizer);
        let summarizer: Arc<dyn Summarizer> = Arc::new(LlmSummarizer::from_config(
            self.provider(),
            &self.config.summarizer,
            self.estimator.clone(),
        ));
        let session_memory: Arc<dyn SessionMemoryHook> = Arc::new(
            SessionMemoryWriter::new(summarizer.clone(), storage.session_memory_dir())
                .with_budget(budget),
        );

        CompactionManager::new(
            self.config.compaction.clone(),
            self.estimator.clone(),
            CompactionDeps {
                summarizer,
                transcripts: self.transcripts.clone(),
                daily_log: Arc::new(FileDailyLog::new(storage.memory_dir())),
                session_memory: Some(session_memory),
            },
        )
        .with_budget(budget)
    }

    /// Context builder over the on-disk knowledge file and chat logs.
    ///
    /// Only `chat_id` is indexed for message search unless `all_chats` is set.
    pub async fn context_builder(
        &self,
        chat_id: &str,
        all_chats: bool,
    ) -> anyhow::Result<ContextBuilder> {
        let search = Arc::new(InMemoryHybridSearch::new());
        let knowledge_path = self.config.storage.knowledge_path();
        let loaded = search
            .load_knowledge(&knowledge_path)
            .await
            .with_context(|| {
                format!("Failed to load knowledge from {}", knowledge_path.display())
            })?;

        let chat_ids = if all_chats {
            self.chats.chat_ids().await?
        } else {
            vec![chat_id.to_string()]
        };
        for id in &chat_ids {
            let messages = self.chats.all_messages(id).await?;
            search.index_chat(id, &messages).await;
        }
        info!(knowledge = loaded, chats = chat_ids.len(), "Search index ready");

        Ok(ContextBuilder::new(self.chats.clone(), self.embedder(), search)
            .with_feed_message_max_chars(self.config.context.feed_message_max_chars))
    }

    /// Every summarizer and embedding call goes through the endpoint chain.
    fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }

    fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        match &self.config.context.embedding_model {
            Some(model) => Arc::new(WarmupEmbedder::new(Arc::new(ProviderEmbedder::new(
                self.provider(),
                model.clone(),
            )))),
            None => Arc::new(NoopEmbedder),
        }
    }
}
