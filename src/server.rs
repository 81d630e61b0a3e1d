//! HTTP API server.
//!
//! Exposes ingestion, search, file listing, and Google sign-in as a JSON API
//! for the browser front end. All routes are nested under `/api`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check (returns version) |
//! | `GET`  | `/api/auth/google/url` | OAuth consent URL |
//! | `GET`/`POST` | `/api/auth/google/callback` | Exchange an authorization code for a session |
//! | `GET`  | `/api/drive/files` | List the caller's supported Drive files |
//! | `POST` | `/api/ingest` | Fetch, embed, and index documents |
//! | `POST` | `/api/search` | Nearest documents for a query |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query is required" } }
//! ```
//!
//! Messages returned to the caller are generic. The underlying cause is
//! logged with `tracing` and never echoed back.
//!
//! # Trust boundary
//!
//! The Drive access token is supplied by the caller on every request
//! (`credential`, or its alias `accessToken`). The server keeps no sessions
//! and forwards the token only to Google Drive.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use drive_recall_core::error::{FetchError, PipelineError, ValidationError};
use drive_recall_core::ingest::{DocumentOutcome, IngestPolicy, IngestRequest};
use drive_recall_core::models::{DocumentRef, SearchMatch};
use drive_recall_core::source::Credential;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{Config, ServerConfig};
use crate::identity::UserSession;
use crate::services::Services;

/// Starts the HTTP server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let app = router(services, &config.server)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "drive-recall listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Build the application router with CORS and request tracing.
pub fn router(services: Services, server: &ServerConfig) -> anyhow::Result<Router> {
    let api = Router::new()
        .route("/health", get(handle_health))
        .route("/auth/google/url", get(handle_auth_url))
        .route(
            "/auth/google/callback",
            get(handle_callback_query).post(handle_callback_body),
        )
        .route("/drive/files", get(handle_list_files))
        .route("/ingest", post(handle_ingest))
        .route("/search", post(handle_search));

    Ok(Router::new()
        .nest("/api", api)
        .layer(cors_layer(&server.cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(services))
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("invalid server.cors_origins entry: {}", e))?;
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        bad_request(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        bad_request("malformed JSON body")
    }
}

fn oauth_disabled() -> AppError {
    AppError::new(
        StatusCode::SERVICE_UNAVAILABLE,
        "oauth_disabled",
        "Google sign-in is not configured",
    )
}

/// Reject missing or blank credentials before touching any pipeline.
fn require_credential(credential: Option<Credential>) -> Result<Credential, ValidationError> {
    credential
        .filter(|c| !c.is_empty())
        .ok_or(ValidationError::MissingField("credential"))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ /auth/google ============

#[derive(Serialize)]
struct AuthUrlResponse {
    url: String,
}

async fn handle_auth_url(
    State(services): State<Services>,
) -> Result<Json<AuthUrlResponse>, AppError> {
    let identity = services.identity.as_ref().ok_or_else(oauth_disabled)?;
    let state = uuid::Uuid::new_v4().to_string();
    let url = identity.authorization_url(&state).map_err(|e| {
        error!(error = %e, "failed to build authorization url");
        AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Failed to build sign-in URL",
        )
    })?;
    Ok(Json(AuthUrlResponse { url }))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

async fn handle_callback_query(
    State(services): State<Services>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<UserSession>, AppError> {
    exchange(&services, params.code).await
}

async fn handle_callback_body(
    State(services): State<Services>,
    payload: Result<Json<CallbackParams>, JsonRejection>,
) -> Result<Json<UserSession>, AppError> {
    let Json(params) = payload?;
    exchange(&services, params.code).await
}

async fn exchange(
    services: &Services,
    code: Option<String>,
) -> Result<Json<UserSession>, AppError> {
    let identity = services.identity.as_ref().ok_or_else(oauth_disabled)?;
    let code = code
        .filter(|c| !c.trim().is_empty())
        .ok_or(ValidationError::MissingField("code"))?;

    let session = identity.exchange_code(&code).await.map_err(|e| {
        error!(error = %e, "oauth code exchange failed");
        AppError::new(StatusCode::BAD_GATEWAY, "auth_failed", "Authentication failed")
    })?;
    Ok(Json(session))
}

// ============ GET /drive/files ============

#[derive(Deserialize)]
struct ListFilesParams {
    #[serde(default, rename = "accessToken", alias = "credential")]
    access_token: Option<Credential>,
}

/// The token may arrive as `?accessToken=` or as an `Authorization: Bearer` header.
async fn handle_list_files(
    State(services): State<Services>,
    headers: HeaderMap,
    Query(params): Query<ListFilesParams>,
) -> Result<Json<Vec<DocumentRef>>, AppError> {
    let credential = params
        .access_token
        .or_else(|| bearer_token(&headers))
        .filter(|c| !c.is_empty())
        .ok_or_else(|| unauthorized("Access token is required"))?;

    match services.drive.list_files(&credential).await {
        Ok(files) => Ok(Json(files)),
        Err(FetchError::Unauthorized { status }) => {
            warn!(status, "drive rejected credential while listing files");
            Err(unauthorized("Access token was rejected"))
        }
        Err(e) => {
            error!(error = %e, "failed to list drive files");
            Err(AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "fetch_failed",
                "Failed to fetch files",
            ))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<Credential> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(Credential::new)
}

// ============ POST /ingest ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestBody {
    #[serde(default)]
    file_ids: Option<Vec<String>>,
    #[serde(default, alias = "accessToken")]
    credential: Option<Credential>,
    /// `fail_fast` or `best_effort`; defaults to `[ingest].policy`.
    #[serde(default)]
    policy: Option<IngestPolicy>,
}

#[derive(Serialize)]
struct IngestResponse {
    success: bool,
    indexed: usize,
    failed: Vec<FailedDocument>,
    skipped: Vec<String>,
}

#[derive(Serialize)]
struct FailedDocument {
    id: String,
    code: &'static str,
}

async fn handle_ingest(
    State(services): State<Services>,
    payload: Result<Json<IngestBody>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let Json(body) = payload?;
    let file_ids = body.file_ids.ok_or(ValidationError::MissingField("fileIds"))?;
    let credential = require_credential(body.credential)?;

    let mut request = IngestRequest::new(credential, file_ids);
    if let Some(policy) = body.policy {
        request = request.with_policy(policy);
    }
    let report = services.ingestor.ingest(&request).await;

    if report.policy == IngestPolicy::FailFast {
        if let Some(err) = report.first_error() {
            return Err(ingest_failed(err));
        }
    }

    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    for outcome in &report.outcomes {
        match outcome {
            DocumentOutcome::Indexed { .. } => {}
            DocumentOutcome::Failed { id, error } => failed.push(FailedDocument {
                id: id.clone(),
                code: error.code(),
            }),
            DocumentOutcome::Skipped { id } => skipped.push(id.clone()),
        }
    }

    Ok(Json(IngestResponse {
        success: report.is_success(),
        indexed: report.indexed_count(),
        failed,
        skipped,
    }))
}

fn ingest_failed(err: &PipelineError) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, err.code(), "Failed to ingest files")
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchBody {
    #[serde(default)]
    query: Option<String>,
    /// Required like every other route, though retrieval never calls Drive.
    #[serde(default, alias = "accessToken")]
    credential: Option<Credential>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn handle_search(
    State(services): State<Services>,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<Vec<SearchMatch>>, AppError> {
    let Json(body) = payload?;
    let query = body.query.ok_or(ValidationError::MissingField("query"))?;
    require_credential(body.credential)?;

    match services.retriever.search(&query, body.limit).await {
        Ok(matches) => Ok(Json(matches)),
        Err(PipelineError::Validation(v)) => Err(v.into()),
        Err(e) => {
            error!(error = %e, "search failed");
            Err(AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.code(),
                "Search failed",
            ))
        }
    }
}
