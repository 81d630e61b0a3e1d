//! Ingestion orchestration.
//!
//! Drives each requested document through `fetch → embed → upsert` and
//! reports a per-document outcome. The per-call [`IngestRequest`] carries
//! the caller's credential; the [`Ingestor`] itself holds no per-user state
//! and can serve concurrent requests.
//!
//! # State machine
//!
//! ```text
//! Idle ─▶ FetchingDoc(id) ─▶ Embedding(id) ─▶ Upserting(id) ─┬─▶ next id
//!                                                            └─▶ Done
//!   any state ─▶ Failed { doc_id, reason }
//! ```
//!
//! # Failure policy
//!
//! The policy is chosen per call with [`IngestRequest::with_policy`];
//! the [`Ingestor`]'s own policy is the fallback.
//!
//! - [`IngestPolicy::FailFast`]: stop at the first failure. Later documents
//!   are [`DocumentOutcome::Skipped`]. `Failed` is terminal and `Done` is
//!   not emitted.
//! - [`IngestPolicy::BestEffort`]: process every document; the caller
//!   retries the failed subset. `Failed` is reported per document, then
//!   processing continues and the batch ends in `Done`.
//!
//! A document is written only after it was fetched and embedded, so a
//! failed document never leaves a record behind.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::error::{EmbeddingError, FetchError, PipelineError};
use crate::index::VectorIndex;
use crate::models::IndexRecord;
use crate::source::{Credential, DocumentSource};

/// What to do with the rest of a batch after one document fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPolicy {
    #[default]
    #[serde(alias = "fail-fast")]
    FailFast,
    #[serde(alias = "best-effort")]
    BestEffort,
}

impl FromStr for IngestPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail_fast" | "fail-fast" => Ok(IngestPolicy::FailFast),
            "best_effort" | "best-effort" => Ok(IngestPolicy::BestEffort),
            other => Err(format!(
                "unknown ingest policy '{}'. Must be fail_fast or best_effort.",
                other
            )),
        }
    }
}

impl fmt::Display for IngestPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestPolicy::FailFast => f.write_str("fail_fast"),
            IngestPolicy::BestEffort => f.write_str("best_effort"),
        }
    }
}

/// Per-call ingestion context.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub credential: Credential,
    pub document_ids: Vec<String>,
    /// Overrides the ingestor's policy for this call.
    pub policy: Option<IngestPolicy>,
}

impl IngestRequest {
    pub fn new(credential: Credential, document_ids: Vec<String>) -> Self {
        Self {
            credential,
            document_ids,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: IngestPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// Orchestrator state, reported to an [`IngestObserver`] on every transition.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestState {
    Idle,
    FetchingDoc(String),
    Embedding(String),
    Upserting(String),
    Done,
    Failed { doc_id: String, reason: String },
}

/// Receives state transitions, e.g. for progress reporting or tests.
pub trait IngestObserver: Send + Sync {
    fn on_transition(&self, state: &IngestState);
}

/// Result of ingesting one document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Indexed { id: String },
    Failed { id: String, error: PipelineError },
    /// Not attempted (or abandoned before writing) because an earlier
    /// document failed under [`IngestPolicy::FailFast`].
    Skipped { id: String },
}

impl DocumentOutcome {
    pub fn id(&self) -> &str {
        match self {
            DocumentOutcome::Indexed { id }
            | DocumentOutcome::Failed { id, .. }
            | DocumentOutcome::Skipped { id } => id,
        }
    }
}

/// Outcomes of one ingest call, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub policy: IngestPolicy,
    pub outcomes: Vec<DocumentOutcome>,
}

impl IngestReport {
    /// True when every document was indexed. An empty batch succeeds.
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, DocumentOutcome::Indexed { .. }))
    }

    pub fn indexed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DocumentOutcome::Indexed { .. }))
            .count()
    }

    /// Failed documents with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &PipelineError)> {
        self.outcomes.iter().filter_map(|o| match o {
            DocumentOutcome::Failed { id, error } => Some((id.as_str(), error)),
            _ => None,
        })
    }

    /// Ids worth retrying: failed plus skipped.
    pub fn retryable_ids(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o, DocumentOutcome::Indexed { .. }))
            .map(|o| o.id().to_string())
            .collect()
    }

    /// The first failure, if any.
    pub fn first_error(&self) -> Option<&PipelineError> {
        self.failures().next().map(|(_, e)| e)
    }
}

/// Composes a [`DocumentSource`], an [`Embedder`], and a [`VectorIndex`]
/// into the ingestion pipeline.
pub struct Ingestor {
    source: Arc<dyn DocumentSource>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    policy: IngestPolicy,
    concurrency: usize,
    observer: Option<Arc<dyn IngestObserver>>,
}

impl Ingestor {
    /// Sequential, fail-fast ingestor.
    pub fn new(
        source: Arc<dyn DocumentSource>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            source,
            embedder,
            index,
            policy: IngestPolicy::default(),
            concurrency: 1,
            observer: None,
        }
    }

    pub fn with_policy(mut self, policy: IngestPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Maximum number of documents in flight at once. `0` is treated as `1`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn policy(&self) -> IngestPolicy {
        self.policy
    }

    /// Ingest every document in the request under the configured policy.
    ///
    /// Never returns `Err`: failures are reported per document in the
    /// [`IngestReport`], and [`IngestReport::is_success`] tells whether the
    /// policy was satisfied.
    pub async fn ingest(&self, request: &IngestRequest) -> IngestReport {
        self.transition(IngestState::Idle);

        let policy = request.policy.unwrap_or(self.policy);
        let abort = AtomicBool::new(false);
        let credential = &request.credential;
        let abort_ref = &abort;

        let outcomes: Vec<DocumentOutcome> = stream::iter(request.document_ids.clone())
            .map(|id| async move { self.process(credential, &id, policy, abort_ref).await })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = IngestReport { policy, outcomes };

        if !abort.load(Ordering::SeqCst) {
            self.transition(IngestState::Done);
        }

        info!(
            policy = %policy,
            requested = request.document_ids.len(),
            indexed = report.indexed_count(),
            failed = report.failures().count(),
            "ingest finished"
        );
        report
    }

    /// Run the full pipeline for a single document and return the record
    /// that was written.
    pub async fn ingest_one(
        &self,
        credential: &Credential,
        id: &str,
    ) -> Result<IndexRecord, PipelineError> {
        let record = self.prepare(credential, id).await?;
        self.write(record).await
    }

    async fn process(
        &self,
        credential: &Credential,
        id: &str,
        policy: IngestPolicy,
        abort: &AtomicBool,
    ) -> DocumentOutcome {
        if abort.load(Ordering::SeqCst) {
            return DocumentOutcome::Skipped { id: id.to_string() };
        }

        let result = match self.prepare(credential, id).await {
            // An earlier document failed while this one was in flight.
            Ok(_) if abort.load(Ordering::SeqCst) => {
                return DocumentOutcome::Skipped { id: id.to_string() };
            }
            Ok(record) => self.write(record).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => DocumentOutcome::Indexed { id: id.to_string() },
            Err(error) => {
                warn!(doc_id = id, code = error.code(), error = %error, "document ingest failed");
                if policy == IngestPolicy::FailFast {
                    abort.store(true, Ordering::SeqCst);
                }
                self.transition(IngestState::Failed {
                    doc_id: id.to_string(),
                    reason: error.to_string(),
                });
                DocumentOutcome::Failed {
                    id: id.to_string(),
                    error,
                }
            }
        }
    }

    /// Fetch and embed; nothing is written yet.
    async fn prepare(
        &self,
        credential: &Credential,
        id: &str,
    ) -> Result<IndexRecord, PipelineError> {
        if id.trim().is_empty() {
            return Err(FetchError::InvalidId(id.to_string()).into());
        }

        self.transition(IngestState::FetchingDoc(id.to_string()));
        let fetched = self.source.fetch(credential, id).await?;
        if fetched.content.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput.into());
        }

        self.transition(IngestState::Embedding(id.to_string()));
        let vector = self.embedder.embed(&fetched.content).await?;

        let mut doc_ref = fetched.doc_ref;
        doc_ref.id = id.to_string();
        Ok(IndexRecord::from_document(&doc_ref, vector))
    }

    async fn write(&self, record: IndexRecord) -> Result<IndexRecord, PipelineError> {
        self.transition(IngestState::Upserting(record.id.clone()));
        self.index.upsert(record.clone()).await?;
        debug!(
            doc_id = %record.id,
            name = %record.metadata.name,
            dims = record.vector.len(),
            "document indexed"
        );
        Ok(record)
    }

    fn transition(&self, state: IngestState) {
        debug!(?state, "ingest state");
        if let Some(observer) = &self.observer {
            observer.on_transition(&state);
        }
    }
}
