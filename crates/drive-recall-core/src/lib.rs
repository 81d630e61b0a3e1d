//! # Drive Recall Core
//!
//! Runtime-agnostic logic for Drive Recall: the document data model, typed
//! pipeline errors, the three component seams ([`DocumentSource`],
//! [`Embedder`], [`VectorIndex`]), an in-memory vector index, and the two
//! orchestrators that compose them.
//!
//! ```text
//! ingest:  DocumentSource ──▶ Embedder ──▶ VectorIndex::upsert
//! search:  query ──▶ Embedder ──▶ VectorIndex::query ──▶ Vec<SearchMatch>
//! ```
//!
//! This crate has no tokio, reqwest, or filesystem dependencies. Concrete
//! network clients live in the `drive-recall` app crate.
//!
//! [`DocumentSource`]: source::DocumentSource
//! [`Embedder`]: embedding::Embedder
//! [`VectorIndex`]: index::VectorIndex

pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod models;
pub mod search;
pub mod source;
