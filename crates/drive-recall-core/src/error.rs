//! Error taxonomy for the ingest and search pipelines.
//!
//! Each component surfaces its own error type; the orchestrators wrap them
//! in [`PipelineError`]. No variant ever carries a credential value, so
//! `Display` output is safe to log.

use thiserror::Error;

/// Failure to fetch a document from the remote file store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("invalid document id: {0:?}")]
    InvalidId(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("credential rejected by file store (status {status})")]
    Unauthorized { status: u16 },

    #[error("file store unreachable: {0}")]
    Unreachable(String),

    #[error("file store returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("could not decode document content: {0}")]
    Decode(String),
}

/// Failure to turn text into an embedding vector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("input text is empty")]
    EmptyInput,

    #[error("input too long: {len} chars, max {max}")]
    InputTooLong { len: usize, max: usize },

    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("embedding provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("embedding has {actual} dimensions, model declares {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Failure to write a record to the vector index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexWriteError {
    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector index unreachable: {0}")]
    Unreachable(String),

    #[error("vector index rejected write: {0}")]
    Rejected(String),
}

/// Failure to query the vector index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexQueryError {
    #[error("query vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector index unreachable: {0}")]
    Unreachable(String),

    #[error("vector index rejected query: {0}")]
    Rejected(String),
}

/// Missing or malformed caller input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("query must not be empty")]
    EmptyQuery,

    #[error("limit must be >= 1, got {0}")]
    InvalidLimit(usize),
}

/// Umbrella error returned by the orchestrators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index write error: {0}")]
    IndexWrite(#[from] IndexWriteError),

    #[error("index query error: {0}")]
    IndexQuery(#[from] IndexQueryError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl PipelineError {
    /// Stable machine-readable code, suitable for returning to callers in
    /// place of the full message.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Fetch(FetchError::Unauthorized { .. }) => "unauthorized",
            PipelineError::Fetch(_) => "fetch_failed",
            PipelineError::Embedding(_) => "embedding_failed",
            PipelineError::IndexWrite(_) => "index_write_failed",
            PipelineError::IndexQuery(_) => "index_query_failed",
            PipelineError::Validation(_) => "bad_request",
        }
    }

    /// Whether the failure was caused by caller input rather than a
    /// downstream component.
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
