//! In-memory [`VectorIndex`] implementation for tests and local runs.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`. Query is
//! brute-force cosine similarity over every stored vector; equal scores are
//! returned in ascending id order.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{IndexQueryError, IndexWriteError};
use crate::models::{IndexRecord, RecordMetadata, SearchMatch};

use super::{rank_matches, VectorIndex};

struct StoredVector {
    vector: Vec<f32>,
    metadata: RecordMetadata,
}

/// In-memory vector index with a fixed dimensionality.
pub struct InMemoryIndex {
    dims: usize,
    records: RwLock<BTreeMap<String, StoredVector>>,
}

impl InMemoryIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return a copy of the record stored under `id`, if any.
    pub fn get(&self, id: &str) -> Option<IndexRecord> {
        let records = self.records.read().ok()?;
        records.get(id).map(|sv| IndexRecord {
            id: id.to_string(),
            vector: sv.vector.clone(),
            metadata: sv.metadata.clone(),
        })
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
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
        let mut records = self
            .records
            .write()
            .map_err(|_| IndexWriteError::Unreachable("index lock poisoned".to_string()))?;
        records.insert(
            record.id,
            StoredVector {
                vector: record.vector,
                metadata: record.metadata,
            },
        );
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
        let records = self
            .records
            .read()
            .map_err(|_| IndexQueryError::Unreachable("index lock poisoned".to_string()))?;
        let matches = records
            .iter()
            .map(|(id, sv)| SearchMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &sv.vector),
                metadata: sv.metadata.clone(),
            })
            .collect();
        Ok(rank_matches(matches, top_k))
    }
}
