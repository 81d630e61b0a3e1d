//! Core data models shared by the ingest and search pipelines.
//!
//! Field names serialize in the camelCase shape the presentation layer and
//! the Drive API both use (`mimeType`, `webViewLink`, `modifiedTime`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type of a native Google Docs document. These cannot be downloaded
/// as raw media and must be exported as plain text instead.
pub const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";

/// Content types the fetcher knows how to turn into plain text.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["text/plain", "text/markdown", GOOGLE_DOC_MIME];

/// A reference to a document in the remote file store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    /// Source-assigned identifier; unique per store.
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub content_type: String,
    #[serde(rename = "webViewLink", default)]
    pub view_link: Option<String>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

impl DocumentRef {
    /// Whether the content must be requested through the plain-text export
    /// endpoint rather than downloaded as raw bytes.
    pub fn needs_export(&self) -> bool {
        self.content_type == GOOGLE_DOC_MIME
    }
}

/// Extracted text of a document, valid for the duration of one ingest call.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub doc_ref: DocumentRef,
    pub content: String,
}

/// Display metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub name: String,
    /// Always equal to the owning record's id.
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
}

/// A single entry of the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl IndexRecord {
    /// Build the record for an embedded document. The record id and
    /// `metadata.file_id` are both taken from the document id.
    pub fn from_document(doc_ref: &DocumentRef, vector: Vec<f32>) -> Self {
        Self {
            id: doc_ref.id.clone(),
            vector,
            metadata: RecordMetadata {
                name: doc_ref.name.clone(),
                file_id: doc_ref.id.clone(),
                web_view_link: doc_ref.view_link.clone(),
                modified_time: doc_ref.modified_time,
            },
        }
    }
}

/// One nearest-neighbour hit returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub id: String,
    /// Similarity; higher is closer.
    pub score: f32,
    pub metadata: RecordMetadata,
}
