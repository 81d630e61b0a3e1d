//! The remote file store seam.
//!
//! A [`DocumentSource`] resolves a document id to its metadata and plain
//! text. Credentials are supplied per call and owned by the caller's
//! request, so one source instance can serve many users concurrently.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::FetchError;
use crate::models::FetchedDocument;

/// Bearer credential for the remote file store.
///
/// The token is accepted from the caller on every request; there is no
/// server-side session. `Debug` and `Display` never print the token.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// A pull source of documents.
///
/// Implementations must be read-only: fetching never changes the store.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short label used in logs (e.g. `"google-drive"`).
    fn name(&self) -> &str;

    /// Fetch a document's metadata and plain-text content.
    async fn fetch(&self, credential: &Credential, id: &str)
        -> Result<FetchedDocument, FetchError>;
}
