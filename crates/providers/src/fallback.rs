//! Ordered chain of summarizer endpoints.
//!
//! Every attempt is bounded by its entry's timeout. A failed or hung endpoint
//! hands the request to the next one; the last error wins when all of them
//! give up. Embedding requests walk the same chain.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recollect_config::SummarizerConfig;
use recollect_core::error::{EmbeddingError, ProviderError};
use recollect_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::{debug, warn};

use crate::OpenAiCompatProvider;

pub struct FallbackProvider {
    name: String,
    chain: Vec<Endpoint>,
}

struct Endpoint {
    provider: Arc<dyn Provider>,
    timeout: Duration,
}

impl Endpoint {
    fn timed_out(&self) -> String {
        format!(
            "Endpoint '{}' gave no answer within {}s",
            self.provider.name(),
            self.timeout.as_secs()
        )
    }
}

enum Attempt<T, E> {
    Answered(T),
    Failed(E),
    TimedOut,
}

async fn attempt<T, E>(
    timeout: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Attempt<T, E> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Attempt::Answered(value),
        Ok(Err(e)) => Attempt::Failed(e),
        Err(_) => Attempt::TimedOut,
    }
}

impl FallbackProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Append an endpoint, tried after every endpoint added before it.
    pub fn add(mut self, provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        self.chain.push(Endpoint { provider, timeout });
        self
    }

    /// The `[summarizer]` endpoint, then `backup_base_url` when set.
    ///
    /// Both share the API key and are bounded by `timeout_secs` per attempt.
    pub fn from_config(config: &SummarizerConfig) -> Result<Self, ProviderError> {
        let per_attempt = Duration::from_secs(config.timeout_secs);
        let mut chain = Self::new(config.provider.clone())
            .add(Arc::new(OpenAiCompatProvider::from_config(config)?), per_attempt);

        if let Some(url) = &config.backup_base_url {
            let backup = OpenAiCompatProvider::new(
                format!("{}-backup", config.provider),
                url.clone(),
                config.api_key.clone().unwrap_or_default(),
            )?;
            chain = chain.add(Arc::new(backup), per_attempt);
        }
        Ok(chain)
    }

    /// Endpoint names in the order they are tried.
    pub fn endpoints(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.provider.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut last_error = None;

        for (i, endpoint) in self.chain.iter().enumerate() {
            let name = endpoint.provider.name();
            debug!(
                endpoint = name,
                model = %request.model,
                attempt = i + 1,
                total = self.chain.len(),
                "Requesting completion"
            );

            let call = endpoint.provider.complete(request.clone());
            match attempt(endpoint.timeout, call).await {
                Attempt::Answered(response) => return Ok(response),
                Attempt::Failed(e) => {
                    warn!(endpoint = name, error = %e, "Completion failed");
                    last_error = Some(e);
                }
                Attempt::TimedOut => {
                    warn!(
                        endpoint = name,
                        timeout_secs = endpoint.timeout.as_secs(),
                        "Completion timed out"
                    );
                    last_error = Some(ProviderError::Timeout(endpoint.timed_out()));
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| ProviderError::NotConfigured("No summarizer endpoints".into()));
        Err(error)
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut last_error = None;

        for endpoint in &self.chain {
            let name = endpoint.provider.name();
            match attempt(endpoint.timeout, endpoint.provider.embed(model, inputs)).await {
                Attempt::Answered(vectors) => return Ok(vectors),
                Attempt::Failed(e) => {
                    debug!(endpoint = name, error = %e, "Embedding failed");
                    last_error = Some(e);
                }
                Attempt::TimedOut => {
                    warn!(endpoint = name, "Embedding timed out");
                    last_error = Some(EmbeddingError::Failed(endpoint.timed_out()));
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| EmbeddingError::Unavailable("No summarizer endpoints".into()));
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const ATTEMPT: Duration = Duration::from_secs(30);

    enum Behavior {
        Reply,
        Fail(ProviderError),
        Hang,
    }

    /// An endpoint with fixed behavior that counts its completion calls.
    struct StubEndpoint {
        name: &'static str,
        behavior: Behavior,
        calls: Mutex<usize>,
    }

    impl StubEndpoint {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for StubEndpoint {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            match &self.behavior {
                Behavior::Reply => Ok(ProviderResponse {
                    text: format!("## User Intent\nfrom {}", self.name),
                    usage: None,
                    model: request.model,
                }),
                Behavior::Fail(e) => Err(e.clone()),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProviderError::Network("woke up".into()))
                }
            }
        }

        async fn embed(
            &self,
            _model: &str,
            inputs: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            match self.behavior {
                Behavior::Reply => Ok(inputs.iter().map(|_| vec![0.5, 0.5]).collect()),
                _ => Err(EmbeddingError::Unavailable(format!("{} has no embeddings", self.name))),
            }
        }
    }

    fn summary_request() -> ProviderRequest {
        ProviderRequest::new("gpt-4o-mini", "Summarize the conversation")
    }

    #[tokio::test]
    async fn primary_answers_without_touching_backup() {
        let primary = StubEndpoint::new("openai", Behavior::Reply);
        let backup = StubEndpoint::new("ollama", Behavior::Reply);
        let chain = FallbackProvider::new("openai")
            .add(primary.clone(), ATTEMPT)
            .add(backup.clone(), ATTEMPT);

        let response = chain.complete(summary_request()).await.unwrap();
        assert_eq!(response.text, "## User Intent\nfrom openai");
        assert_eq!((primary.calls(), backup.calls()), (1, 0));
    }

    #[tokio::test]
    async fn failing_primary_hands_off() {
        for error in [
            ProviderError::ApiError {
                status_code: 503,
                message: "overloaded".into(),
            },
            ProviderError::RateLimited { retry_after_secs: 60 },
        ] {
            let primary = StubEndpoint::new("openai", Behavior::Fail(error));
            let backup = StubEndpoint::new("ollama", Behavior::Reply);
            let chain = FallbackProvider::new("openai")
                .add(primary.clone(), ATTEMPT)
                .add(backup.clone(), ATTEMPT);

            let response = chain.complete(summary_request()).await.unwrap();
            assert_eq!(response.text, "## User Intent\nfrom ollama");
            assert_eq!((primary.calls(), backup.calls()), (1, 1));
        }
    }

    #[tokio::test]
    async fn exhausted_chain_reports_last_error() {
        let chain = FallbackProvider::new("openai")
            .add(
                StubEndpoint::new(
                    "openai",
                    Behavior::Fail(ProviderError::Network("refused".into())),
                ),
                ATTEMPT,
            )
            .add(
                StubEndpoint::new(
                    "ollama",
                    Behavior::Fail(ProviderError::AuthenticationFailed("bad key".into())),
                ),
                ATTEMPT,
            );

        let err = chain.complete(summary_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_endpoint_times_out_per_attempt() {
        let backup = StubEndpoint::new("ollama", Behavior::Reply);
        let chain = FallbackProvider::new("openai")
            .add(StubEndpoint::new("openai", Behavior::Hang), Duration::from_secs(5))
            .add(backup.clone(), ATTEMPT);

        let started = tokio::time::Instant::now();
        assert!(chain.complete(summary_request()).await.is_ok());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5) && waited < ATTEMPT, "waited {waited:?}");
        assert_eq!(backup.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lone_hung_endpoint_surfaces_timeout() {
        let chain = FallbackProvider::new("openai")
            .add(StubEndpoint::new("openai", Behavior::Hang), Duration::from_secs(5));

        match chain.complete(summary_request()).await.unwrap_err() {
            ProviderError::Timeout(message) => assert!(message.contains("within 5s")),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let chain = FallbackProvider::new("none");
        assert!(chain.is_empty());
        assert!(matches!(
            chain.complete(summary_request()).await,
            Err(ProviderError::NotConfigured(_))
        ));
        assert!(matches!(
            chain.embed("m", &["a".into()]).await,
            Err(EmbeddingError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn embedding_skips_endpoints_without_support() {
        let chain = FallbackProvider::new("openai")
            .add(
                StubEndpoint::new("chat-only", Behavior::Fail(ProviderError::Network("x".into()))),
                ATTEMPT,
            )
            .add(StubEndpoint::new("embedder", Behavior::Reply), ATTEMPT);

        let vectors = chain
            .embed("text-embedding-3-small", &["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![0.5, 0.5], vec![0.5, 0.5]]);
    }

    #[test]
    fn from_config_primary_only() {
        let chain = FallbackProvider::from_config(&SummarizerConfig::default()).unwrap();
        assert_eq!(chain.name(), "openai");
        assert_eq!(chain.endpoints(), vec!["openai"]);
    }

    #[test]
    fn from_config_appends_backup_endpoint() {
        let config = SummarizerConfig {
            backup_base_url: Some("http://localhost:11434/v1".into()),
            ..Default::default()
        };
        let chain = FallbackProvider::from_config(&config).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.endpoints(), vec!["openai", "openai-backup"]);
    }
}
