//! Google Drive document source.
//!
//! Implements [`DocumentSource`] over the Drive v3 REST API. Each fetch is
//! two calls: `files.get` for metadata, then either `files.export`
//! (Google Docs, as `text/plain`) or `files.get?alt=media` (everything
//! else). The caller's credential is sent as a bearer token and never
//! appears in errors or logs.

use async_trait::async_trait;
use drive_recall_core::error::FetchError;
use drive_recall_core::models::{DocumentRef, FetchedDocument, SUPPORTED_MIME_TYPES};
use drive_recall_core::source::{Credential, DocumentSource};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::DriveConfig;

const FILE_FIELDS: &str = "id,name,mimeType,webViewLink,modifiedTime";

/// Client for the Google Drive v3 API.
pub struct DriveClient {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DocumentRef>,
}

impl DriveClient {
    pub fn new(config: &DriveConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// List the caller's files whose type the fetcher can handle.
    pub async fn list_files(
        &self,
        credential: &Credential,
    ) -> Result<Vec<DocumentRef>, FetchError> {
        let query = SUPPORTED_MIME_TYPES
            .iter()
            .map(|m| format!("mimeType='{}'", m))
            .collect::<Vec<_>>()
            .join(" or ");
        let fields = format!("files({})", FILE_FIELDS);

        let response = self
            .client
            .get(format!("{}/files", self.api_base))
            .query(&[("q", query.as_str()), ("fields", fields.as_str())])
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(unreachable_err)?;
        let response = check_status(response, None).await?;

        let list: FileList = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        debug!(count = list.files.len(), "listed drive files");
        Ok(list.files)
    }

    async fn metadata(&self, credential: &Credential, id: &str) -> Result<DocumentRef, FetchError> {
        let response = self
            .client
            .get(format!("{}/files/{}", self.api_base, id))
            .query(&[("fields", FILE_FIELDS)])
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(unreachable_err)?;
        let response = check_status(response, Some(id)).await?;
        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(format!("metadata for {}: {}", id, e)))
    }

    async fn content(
        &self,
        credential: &Credential,
        doc_ref: &DocumentRef,
    ) -> Result<String, FetchError> {
        let request = if doc_ref.needs_export() {
            self.client
                .get(format!("{}/files/{}/export", self.api_base, doc_ref.id))
                .query(&[("mimeType", "text/plain")])
        } else {
            self.client
                .get(format!("{}/files/{}", self.api_base, doc_ref.id))
                .query(&[("alt", "media")])
        };

        let response = request
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(unreachable_err)?;
        let response = check_status(response, Some(&doc_ref.id)).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::Decode(format!("content of {}: {}", doc_ref.id, e)))
    }
}

#[async_trait]
impl DocumentSource for DriveClient {
    fn name(&self) -> &str {
        "google-drive"
    }

    async fn fetch(
        &self,
        credential: &Credential,
        id: &str,
    ) -> Result<FetchedDocument, FetchError> {
        if !is_valid_id(id) {
            return Err(FetchError::InvalidId(id.to_string()));
        }

        let doc_ref = self.metadata(credential, id).await?;
        let content = self.content(credential, &doc_ref).await?;
        debug!(id, mime = %doc_ref.content_type, bytes = content.len(), "fetched document");

        Ok(FetchedDocument { doc_ref, content })
    }
}

/// Drive ids are URL-safe base64-ish tokens.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn unreachable_err(e: reqwest::Error) -> FetchError {
    FetchError::Unreachable(e.without_url().to_string())
}

async fn check_status(
    response: reqwest::Response,
    id: Option<&str>,
) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        404 => Err(FetchError::NotFound(id.unwrap_or("").to_string())),
        401 => Err(FetchError::Unauthorized { status: 401 }),
        403 => {
            let body = response.text().await.unwrap_or_default();
            Err(classify_forbidden(&body))
        }
        code => {
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::Upstream {
                status: code,
                message: body.chars().take(200).collect(),
            })
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: String,
}

/// Drive answers 403 both for missing permissions and for quota or export
/// problems. Only the former means the credential is at fault.
fn classify_forbidden(body: &str) -> FetchError {
    let reason = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.errors.into_iter().next())
        .map(|r| r.reason)
        .unwrap_or_default();

    match reason.as_str() {
        "" | "forbidden" | "insufficientPermissions" | "insufficientFilePermissions"
        | "authError" | "domainPolicy" => FetchError::Unauthorized { status: 403 },
        _ => FetchError::Upstream {
            status: 403,
            message: reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(is_valid_id("1aBcD_ef-GH"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../secrets"));
        assert!(!is_valid_id("a b"));
        assert!(!is_valid_id("id?alt=media"));
    }

    fn drive_error(reason: &str) -> String {
        serde_json::json!({
            "error": {
                "code": 403,
                "message": "denied",
                "errors": [{ "domain": "usageLimits", "reason": reason }]
            }
        })
        .to_string()
    }

    #[test]
    fn test_forbidden_permission_is_unauthorized() {
        assert_eq!(
            classify_forbidden(&drive_error("insufficientPermissions")),
            FetchError::Unauthorized { status: 403 }
        );
        assert_eq!(classify_forbidden(""), FetchError::Unauthorized { status: 403 });
    }

    #[test]
    fn test_forbidden_quota_and_export_are_upstream() {
        assert_eq!(
            classify_forbidden(&drive_error("userRateLimitExceeded")),
            FetchError::Upstream {
                status: 403,
                message: "userRateLimitExceeded".to_string()
            }
        );
        assert!(matches!(
            classify_forbidden(&drive_error("cannotExportFile")),
            FetchError::Upstream { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_id_rejected_without_request() {
        let config = DriveConfig {
            // Nothing listens here.
            api_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        };
        let drive = DriveClient::new(&config).unwrap();
        let err = drive
            .fetch(&Credential::new("token"), "bad/id")
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::InvalidId("bad/id".to_string()));
    }

    #[test]
    fn test_api_base_trailing_slash() {
        let config = DriveConfig {
            api_base: "http://drive.local/v3/".to_string(),
            timeout_secs: 5,
        };
        let drive = DriveClient::new(&config).unwrap();
        assert_eq!(drive.api_base, "http://drive.local/v3");
        assert_eq!(drive.name(), "google-drive");
    }
}
