//! Retrieval orchestration.
//!
//! Stateless per call: validate the query, embed it with the same
//! [`Embedder`] used at ingest time, and hand the vector to the
//! [`VectorIndex`]. Ranking is the index's own scoring; the result is
//! returned unchanged. Any component error fails the whole call.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{PipelineError, ValidationError};
use crate::index::{VectorIndex, DEFAULT_TOP_K};
use crate::models::SearchMatch;

/// Upper bound on results when none is configured.
pub const DEFAULT_MAX_LIMIT: usize = 50;

/// Composes an [`Embedder`] and a [`VectorIndex`] into the search pipeline.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    default_limit: usize,
    max_limit: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            default_limit: DEFAULT_TOP_K,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }

    /// Override the default and maximum result counts.
    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self.default_limit = default_limit.clamp(1, self.max_limit);
        self
    }

    /// Search for the documents nearest to `query`.
    ///
    /// `limit` defaults to the configured default (5) and is clamped to the
    /// configured maximum.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyQuery`] for empty or whitespace-only text.
    /// - [`ValidationError::InvalidLimit`] for `Some(0)`.
    /// - Embedding or index query errors, unchanged.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchMatch>, PipelineError> {
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        let top_k = match limit {
            Some(0) => return Err(ValidationError::InvalidLimit(0).into()),
            Some(n) => n.min(self.max_limit),
            None => self.default_limit,
        };

        let vector = self.embedder.embed(query).await?;
        let matches = self.index.query(&vector, top_k).await?;

        debug!(top_k, hits = matches.len(), model = self.embedder.model_name(), "search complete");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, IndexQueryError};
    use crate::index::memory::InMemoryIndex;
    use crate::models::{DocumentRef, IndexRecord};
    use async_trait::async_trait;

    /// One axis per known word; unknown words are ignored.
    struct VocabEmbedder(Vec<&'static str>);

    #[async_trait]
    impl Embedder for VocabEmbedder {
        fn model_name(&self) -> &str {
            "vocab"
        }
        fn dims(&self) -> usize {
            self.0.len()
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut v = vec![0.0; self.0.len()];
            for word in text.split_whitespace() {
                if let Some(i) = self.0.iter().position(|w| *w == word) {
                    v[i] += 1.0;
                }
            }
            Ok(v)
        }
    }

    struct DownIndex;

    #[async_trait]
    impl VectorIndex for DownIndex {
        fn dims(&self) -> usize {
            3
        }
        async fn upsert(&self, _record: IndexRecord) -> Result<(), crate::error::IndexWriteError> {
            Ok(())
        }
        async fn query(&self, _v: &[f32], _k: usize) -> Result<Vec<SearchMatch>, IndexQueryError> {
            Err(IndexQueryError::Unreachable("connection refused".to_string()))
        }
    }

    fn embedder() -> Arc<VocabEmbedder> {
        Arc::new(VocabEmbedder(vec!["rust", "python", "deploy"]))
    }

    async fn seeded() -> Retriever {
        let embedder = embedder();
        let index = Arc::new(InMemoryIndex::new(3));
        for (id, text) in [
            ("r", "rust rust"),
            ("p", "python"),
            ("d", "deploy rust"),
            ("x1", "python deploy"),
            ("x2", "deploy"),
            ("x3", "python python deploy"),
        ] {
            let doc = DocumentRef {
                id: id.to_string(),
                name: id.to_string(),
                content_type: "text/plain".to_string(),
                view_link: None,
                modified_time: None,
            };
            let v = embedder.embed(text).await.unwrap();
            index.upsert(IndexRecord::from_document(&doc, v)).await.unwrap();
        }
        Retriever::new(embedder, index)
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let retriever = seeded().await;
        let err = retriever.search("  ", None).await.unwrap_err();
        assert_eq!(err, PipelineError::Validation(ValidationError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let retriever = seeded().await;
        let err = retriever.search("rust", Some(0)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_default_limit_is_five() {
        let retriever = seeded().await;
        let hits = retriever.search("deploy", None).await.unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn test_results_sorted_descending() {
        let retriever = seeded().await;
        let hits = retriever.search("rust", Some(3)).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "r");
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_limit_clamped_to_max() {
        let retriever = seeded().await.with_limits(2, 3);
        assert_eq!(retriever.search("deploy", None).await.unwrap().len(), 2);
        assert_eq!(retriever.search("deploy", Some(100)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_repeated_search_is_stable() {
        let retriever = seeded().await;
        let first: Vec<String> = retriever
            .search("python deploy", None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        let second: Vec<String> = retriever
            .search("python deploy", None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_index_failure_propagates() {
        let retriever = Retriever::new(embedder(), Arc::new(DownIndex));
        let err = retriever.search("rust", None).await.unwrap_err();
        assert_eq!(err.code(), "index_query_failed");
    }
}
