//! TOML configuration.
//!
//! Every component receives its settings from a [`Config`] value at
//! construction time. Secrets are not stored in the file: API keys are read
//! from the environment once, when components are built (see
//! [`crate::services`]).
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:3001"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-ada-002"
//! dims = 1536
//!
//! [index]
//! provider = "pinecone"
//! host = "https://my-index-abc123.svc.us-east1-gcp.pinecone.io"
//! ```

use anyhow::{bail, Context, Result};
use drive_recall_core::ingest::IngestPolicy;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Origins allowed by CORS. `["*"]` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:8081".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible gateway or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    /// Inputs longer than this many characters are rejected before any
    /// API call. ada-002 accepts 8191 tokens, roughly 4 chars each.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay; doubles on each attempt.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_input_chars: default_max_input_chars(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Configured model, or the provider's default.
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider.as_str() {
            "ollama" => "nomic-embed-text".to_string(),
            _ => "text-embedding-ada-002".to_string(),
        })
    }

    /// Configured dimensionality, or the default model's.
    pub fn dims_or_default(&self) -> usize {
        self.dims.unwrap_or(match self.provider.as_str() {
            "ollama" => 768,
            "disabled" => 0,
            _ => 1536,
        })
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_input_chars() -> usize {
    32_000
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_base_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"pinecone"` or `"memory"`.
    #[serde(default = "default_index_provider")]
    pub provider: String,
    /// Pinecone index host, e.g. `https://docs-abc123.svc.us-east1-gcp.pinecone.io`.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index_provider() -> String {
    "memory".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    #[serde(default = "default_drive_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: default_drive_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}
fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
fn default_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default)]
    pub policy: IngestPolicy,
    /// Documents processed at once. `1` is strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            policy: IngestPolicy::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> usize {
    5
}
fn default_max_limit() -> usize {
    50
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() && config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    if config.embedding.max_input_chars == 0 {
        bail!("embedding.max_input_chars must be > 0");
    }

    match config.index.provider.as_str() {
        "memory" => {}
        "pinecone" => {
            if config.index.host.as_deref().map_or(true, |h| h.trim().is_empty()) {
                bail!("index.host must be set when index.provider is 'pinecone'");
            }
        }
        other => bail!(
            "Unknown index provider: '{}'. Must be memory or pinecone.",
            other
        ),
    }

    if config.ingest.concurrency == 0 {
        bail!("ingest.concurrency must be >= 1");
    }

    if config.retrieval.default_limit == 0 || config.retrieval.max_limit == 0 {
        bail!("retrieval limits must be >= 1");
    }
    if config.retrieval.default_limit > config.retrieval.max_limit {
        bail!("retrieval.default_limit must be <= retrieval.max_limit");
    }

    Ok(())
}
