//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! plus input/output checks shared by those backends and the cosine
//! similarity used by the in-memory index.
//!
//! Concrete providers (OpenAI, Ollama) live in the `drive-recall` app crate.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Trait for embedding providers.
///
/// The same instance must be used for document ingestion and for query
/// embedding, otherwise similarity scores are meaningless.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the versioned model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed one text string into one vector of length [`dims`](Embedder::dims).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Reject empty input and input longer than `max_chars` characters.
///
/// Providers call this before making a network request so oversized
/// documents fail without spending an API call.
pub fn check_input(text: &str, max_chars: usize) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    let len = text.chars().count();
    if len > max_chars {
        return Err(EmbeddingError::InputTooLong { len, max: max_chars });
    }
    Ok(())
}

/// Verify a provider response has the declared dimensionality.
pub fn check_dims(vector: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or
/// zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
