//! Pinecone vector index backend.
//!
//! Talks to a single Pinecone index over its data-plane REST API
//! (`/vectors/upsert` and `/query`), authenticated with the `Api-Key`
//! header. Metadata is stored as `{name, fileId, webViewLink, modifiedTime}`.
//!
//! `dims` is the embedder's dimensionality. The per-call checks in
//! [`VectorIndex::upsert`] and [`VectorIndex::query`] only catch vectors
//! that disagree with it locally; [`PineconeIndex::verify_dimension`]
//! compares it with the dimension the index was created with.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drive_recall_core::error::{IndexQueryError, IndexWriteError};
use drive_recall_core::index::{rank_matches, VectorIndex};
use drive_recall_core::models::{IndexRecord, RecordMetadata, SearchMatch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::IndexConfig;

/// A Pinecone index reachable at a fixed host.
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    namespace: Option<String>,
    api_key: String,
    dims: usize,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: [UpsertVector<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a RecordMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct IndexStats {
    dimension: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Deserialize)]
struct RawMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig, dims: usize, api_key: impl Into<String>) -> Result<Self> {
        let host = config
            .host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| anyhow!("index.host is required for the pinecone provider"))?;
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("Pinecone API key must not be empty");
        }

        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host,
            namespace: config.namespace.clone(),
            api_key,
            dims,
        })
    }

    /// Create the index with the key from `PINECONE_API_KEY`.
    pub fn from_env(config: &IndexConfig, dims: usize) -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow!("PINECONE_API_KEY environment variable not set"))?;
        Self::new(config, dims, api_key)
    }

    /// Fail unless the remote index was created with `dims` dimensions.
    pub async fn verify_dimension(&self) -> Result<()> {
        let response = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await
            .map_err(|e| match e {
                PostError::Network(m) | PostError::Status(m) => {
                    anyhow!("describe_index_stats failed: {}", m)
                }
            })?;
        let stats: IndexStats = response.json().await?;

        if stats.dimension != self.dims {
            bail!(
                "Pinecone index has dimension {}, embedding model produces {}",
                stats.dimension,
                self.dims
            );
        }
        debug!(dims = self.dims, "pinecone dimension verified");
        Ok(())
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, PostError> {
        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PostError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(PostError::Status(format!(
            "status {}: {}",
            status.as_u16(),
            text.chars().take(200).collect::<String>()
        )))
    }
}

enum PostError {
    Network(String),
    Status(String),
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn upsert(&self, record: IndexRecord) -> Result<(), IndexWriteError> {
        if record.vector.len() != self.dims {
            return Err(IndexWriteError::DimensionMismatch {
                expected: self.dims,
                actual: record.vector.len(),
            });
        }

        let body = UpsertRequest {
            vectors: [UpsertVector {
                id: &record.id,
                values: &record.vector,
                metadata: &record.metadata,
            }],
            namespace: self.namespace.as_deref(),
        };

        self.post("/vectors/upsert", &body).await.map_err(|e| match e {
            PostError::Network(m) => IndexWriteError::Unreachable(m),
            PostError::Status(m) => IndexWriteError::Rejected(m),
        })?;
        debug!(id = %record.id, "pinecone upsert");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, IndexQueryError> {
        if vector.len() != self.dims {
            return Err(IndexQueryError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }

        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };

        let response = self.post("/query", &body).await.map_err(|e| match e {
            PostError::Network(m) => IndexQueryError::Unreachable(m),
            PostError::Status(m) => IndexQueryError::Rejected(m),
        })?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| IndexQueryError::Rejected(format!("invalid query response: {}", e)))?;

        let matches = parsed.matches.into_iter().map(into_match).collect();
        Ok(rank_matches(matches, top_k))
    }
}

/// Records written by other tools may lack fields; fall back rather than fail.
fn into_match(raw: RawMatch) -> SearchMatch {
    let text = |key: &str| {
        raw.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let modified_time = text("modifiedTime")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let metadata = RecordMetadata {
        name: text("name").unwrap_or_default(),
        file_id: text("fileId").unwrap_or_else(|| raw.id.clone()),
        web_view_link: text("webViewLink"),
        modified_time,
    };

    SearchMatch {
        id: raw.id,
        score: raw.score,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: Option<&str>) -> IndexConfig {
        IndexConfig {
            provider: "pinecone".to_string(),
            host: host.map(str::to_string),
            namespace: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_host_normalisation() {
        let index =
            PineconeIndex::new(&config(Some("docs-abc.svc.pinecone.io/")), 3, "key").unwrap();
        assert_eq!(index.host, "https://docs-abc.svc.pinecone.io");

        let index = PineconeIndex::new(&config(Some("http://127.0.0.1:5080")), 3, "key").unwrap();
        assert_eq!(index.host, "http://127.0.0.1:5080");
    }

    #[test]
    fn test_requires_host_and_key() {
        assert!(PineconeIndex::new(&config(None), 3, "key").is_err());
        assert!(PineconeIndex::new(&config(Some("h")), 3, " ").is_err());
    }

    #[tokio::test]
    async fn test_dimension_checked_before_request() {
        let index = PineconeIndex::new(&config(Some("http://127.0.0.1:9")), 3, "key").unwrap();
        let err = index.query(&[1.0], 5).await.unwrap_err();
        assert_eq!(err, IndexQueryError::DimensionMismatch { expected: 3, actual: 1 });
    }

    #[test]
    fn test_into_match_tolerates_sparse_metadata() {
        let raw: RawMatch = serde_json::from_value(serde_json::json!({
            "id": "doc-9",
            "score": 0.5,
            "metadata": {"name": "Plan", "modifiedTime": "not a date"}
        }))
        .unwrap();
        let hit = into_match(raw);
        assert_eq!(hit.metadata.file_id, "doc-9");
        assert_eq!(hit.metadata.name, "Plan");
        assert!(hit.metadata.modified_time.is_none());
        assert!(hit.metadata.web_view_link.is_none());
    }

    #[test]
    fn test_query_request_shape() {
        let body = QueryRequest {
            vector: &[0.1, 0.2],
            top_k: 5,
            include_metadata: true,
            include_values: false,
            namespace: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["topK"], 5);
        assert_eq!(json["includeMetadata"], true);
        assert!(json.get("namespace").is_none());
    }
}
