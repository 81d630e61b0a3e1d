//! Embedding provider implementations.
//!
//! Concrete [`Embedder`] backends:
//! - **[`DisabledEmbedder`]**: always fails; used when embeddings are not configured.
//! - **[`OpenAiEmbedder`]**: calls the OpenAI `/v1/embeddings` API.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named in the
//! configuration:
//!
//! ```rust,no_run
//! # use drive_recall::config::EmbeddingConfig;
//! # use drive_recall_core::embedding::Embedder;
//! # use drive_recall::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! Both network providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: base, 2×base, 4×base … (exponent capped at 5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use drive_recall_core::embedding::{check_dims, check_input, Embedder};
use drive_recall_core::error::EmbeddingError;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] (reads `OPENAI_API_KEY`) |
/// | `"ollama"` | [`OllamaEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::from_env(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// An embedder that always fails with [`EmbeddingError::Unavailable`].
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ Shared HTTP plumbing ============

/// Retry settings and client shared by the network providers.
struct HttpEmbedClient {
    client: reqwest::Client,
    max_retries: u32,
    retry_base: Duration,
    provider: &'static str,
}

impl HttpEmbedClient {
    fn new(config: &EmbeddingConfig, provider: &'static str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
            provider,
        })
    }

    /// POST `body` to `url` and decode a JSON response, retrying
    /// rate-limit, server, and network errors.
    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<T, EmbeddingError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base * (1u32 << (attempt - 1).min(5));
                debug!(provider = self.provider, attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            let message = format!("{} response: {}", self.provider, e);
                            EmbeddingError::InvalidResponse(message)
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = EmbeddingError::Upstream {
                        status: status.as_u16(),
                        message: truncate(&body_text, 200),
                    };

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(
                            provider = self.provider,
                            %status,
                            attempt,
                            "transient embedding error"
                        );
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    warn!(
                        provider = self.provider,
                        error = %e,
                        attempt,
                        "embedding request failed"
                    );
                    last_err = Some(EmbeddingError::Unavailable(format!(
                        "{} request failed: {}",
                        self.provider, e
                    )));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            EmbeddingError::Unavailable(format!("{} embedding failed after retries", self.provider))
        }))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}

// ============ OpenAI Provider ============

/// Embedder using the OpenAI embeddings API.
///
/// Calls `POST {url}/v1/embeddings` with `{model, input}`. The API key is
/// supplied at construction; no process-wide client state is kept.
pub struct OpenAiEmbedder {
    http: HttpEmbedClient,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
    max_input_chars: usize,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("OpenAI API key must not be empty");
        }
        let base = config.url.as_deref().unwrap_or(OPENAI_BASE_URL);
        Ok(Self {
            http: HttpEmbedClient::new(config, "openai")?,
            endpoint: format!("{}/v1/embeddings", base.trim_end_matches('/')),
            api_key,
            model: config.model_or_default(),
            dims: config.dims_or_default(),
            max_input_chars: config.max_input_chars,
        })
    }

    /// Create the provider with the key from `OPENAI_API_KEY`.
    pub fn from_env(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        check_input(text, self.max_input_chars)?;

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let response: OpenAiResponse = self
            .http
            .post_json(&self.endpoint, Some(&self.api_key), &body)
            .await?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("missing data[0].embedding".to_string())
            })?;
        check_dims(&vector, self.dims)?;
        Ok(vector)
    }
}

// ============ Ollama Provider ============

/// Embedder using a local Ollama instance.
///
/// Calls `POST {url}/api/embed` (default `http://localhost:11434`). Requires
/// an embedding model to be pulled, e.g. `ollama pull nomic-embed-text`.
pub struct OllamaEmbedder {
    http: HttpEmbedClient,
    endpoint: String,
    model: String,
    dims: usize,
    max_input_chars: usize,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        Ok(Self {
            http: HttpEmbedClient::new(config, "ollama")?,
            endpoint: format!("{}/api/embed", base.trim_end_matches('/')),
            model: config.model_or_default(),
            dims: config.dims_or_default(),
            max_input_chars: config.max_input_chars,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        check_input(text, self.max_input_chars)?;

        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let response: OllamaResponse = self.http.post_json(&self.endpoint, None, &body).await?;

        let vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("missing embeddings[0]".to_string()))?;
        check_dims(&vector, self.dims)?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_disabled() {
        let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.model_name(), "disabled");
        assert_eq!(embedder.dims(), 0);
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "magic".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[tokio::test]
    async fn test_disabled_always_fails() {
        let err = DisabledEmbedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }

    #[test]
    fn test_openai_rejects_empty_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(OpenAiEmbedder::new(&config, "").is_err());
    }

    #[tokio::test]
    async fn test_openai_validates_input_before_request() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            // Nothing listens here; a request would fail with Unavailable.
            url: Some("http://127.0.0.1:9".to_string()),
            max_input_chars: 5,
            max_retries: 0,
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&config, "sk-test").unwrap();
        assert_eq!(embedder.embed("").await, Err(EmbeddingError::EmptyInput));
        assert_eq!(
            embedder.embed("too long").await,
            Err(EmbeddingError::InputTooLong { len: 8, max: 5 })
        );
    }

    #[test]
    fn test_openai_endpoint_and_defaults() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            url: Some("http://gateway.local/".to_string()),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&config, "sk-test").unwrap();
        assert_eq!(embedder.endpoint, "http://gateway.local/v1/embeddings");
        assert_eq!(embedder.model_name(), "text-embedding-ada-002");
        assert_eq!(embedder.dims(), 1536);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
