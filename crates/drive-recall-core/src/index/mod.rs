//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only durable state in the system: a
//! mapping from document id to `(vector, metadata)` that answers
//! nearest-neighbour queries. Implementations guarantee per-record
//! atomicity only; concurrent upserts of the same id are last-write-wins.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorIndex::upsert) | Insert or overwrite a record by id |
//! | [`query`](VectorIndex::query) | Top-k matches, descending by score |

pub mod memory;

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::error::{IndexQueryError, IndexWriteError};
use crate::models::{IndexRecord, SearchMatch};

/// Result count used when the caller does not ask for one.
pub const DEFAULT_TOP_K: usize = 5;

/// Abstract vector index backend.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every stored and queried vector must have.
    fn dims(&self) -> usize;

    /// Write or overwrite the record keyed by `record.id`.
    ///
    /// Either the vector and metadata are both stored, or nothing is.
    /// Fails with [`IndexWriteError::DimensionMismatch`] before any write
    /// when the vector length differs from [`dims`](VectorIndex::dims).
    async fn upsert(&self, record: IndexRecord) -> Result<(), IndexWriteError>;

    /// Return at most `top_k` matches, sorted by descending score, with
    /// metadata attached.
    async fn query(&self, vector: &[f32], top_k: usize)
        -> Result<Vec<SearchMatch>, IndexQueryError>;
}

/// Sort matches by descending score and keep the first `top_k`.
///
/// The sort is stable, so equal scores keep the order the backend
/// produced them in.
pub fn rank_matches(mut matches: Vec<SearchMatch>, top_k: usize) -> Vec<SearchMatch> {
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    matches.truncate(top_k);
    matches
}
