//! Embedding adapters.
//!
//! [`ProviderEmbedder`] turns an LLM [`Provider`]'s batch embedding endpoint
//! into a query embedder. [`WarmupEmbedder`] warms up an embedder before first
//! use and switches vector search off for the rest of the process if the
//! warm-up keeps failing.

use async_trait::async_trait;
use recollect_core::error::EmbeddingError;
use recollect_core::provider::Provider;
use recollect_core::search::EmbeddingProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Warm-up attempts before the embedder is disabled.
pub const WARMUP_ATTEMPTS: usize = 2;

const WARMUP_RETRY_DELAY: Duration = Duration::from_millis(500);
const WARMUP_QUERY: &str = "warmup";

/// Query embeddings from a provider's embedding endpoint.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ProviderEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self
            .provider
            .embed(&self.model, &[text.to_string()])
            .await?;
        if vectors.is_empty() {
            return Err(EmbeddingError::Failed(format!(
                "{} returned no embedding",
                self.provider.name()
            )));
        }
        Ok(vectors.swap_remove(0))
    }
}

/// Wraps an embedder with a bounded warm-up.
///
/// The first call tries the inner embedder up to [`WARMUP_ATTEMPTS`] times.
/// If every attempt fails, all later calls return an empty vector and search
/// degrades to keyword-only for the lifetime of the process.
pub struct WarmupEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    available: OnceCell<bool>,
    retry_delay: Duration,
}

impl WarmupEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            available: OnceCell::new(),
            retry_delay: WARMUP_RETRY_DELAY,
        }
    }

    async fn warm_up(&self) -> bool {
        for attempt in 1..=WARMUP_ATTEMPTS {
            match self.inner.embed_query(WARMUP_QUERY).await {
                Ok(vector) if !vector.is_empty() => {
                    info!(
                        embedder = self.inner.name(),
                        dims = vector.len(),
                        "Embedding model ready"
                    );
                    return true;
                }
                Ok(_) => {
                    warn!(
                        embedder = self.inner.name(),
                        attempt,
                        "Embedding warm-up returned an empty vector"
                    );
                }
                Err(e) => {
                    warn!(
                        embedder = self.inner.name(),
                        attempt,
                        error = %e,
                        "Embedding warm-up failed"
                    );
                }
            }
            if attempt < WARMUP_ATTEMPTS {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        warn!(
            embedder = self.inner.name(),
            "Embedding disabled after {WARMUP_ATTEMPTS} failed attempts, search is keyword-only"
        );
        false
    }

    /// Whether vector search is on. Runs the warm-up on first call.
    pub async fn is_available(&self) -> bool {
        *self.available.get_or_init(|| self.warm_up()).await
    }
}

#[async_trait]
impl EmbeddingProvider for WarmupEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.is_available().await {
            return Ok(Vec::new());
        }
        self.inner.embed_query(text).await
    }
}
