//! No-op embedder: disables vector search entirely.

use async_trait::async_trait;
use recollect_core::error::EmbeddingError;
use recollect_core::search::EmbeddingProvider;

/// An embedder that returns empty vectors, so search runs keyword-only.
pub struct NoopEmbedder;

#[async_trait]
impl EmbeddingProvider for NoopEmbedder {
    fn name(&self) -> &str {
        "none"
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(Vec::new())
    }
}
