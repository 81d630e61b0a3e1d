//! Local stand-ins for Google Drive, OAuth, OpenAI, and Pinecone, served by
//! axum on an ephemeral port.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DRIVE_TOKEN: &str = "good-token";
pub const OPENAI_KEY: &str = "sk-test";
pub const PINECONE_KEY: &str = "pc-key";
pub const GOOGLE_DOC: &str = "application/vnd.google-apps.document";

/// Words the mock embedding model knows; one dimension each.
pub const VOCAB: &[&str] = &["hello", "world", "rust", "cargo", "python", "deploy"];

/// (id, name, mimeType, content)
pub const DOCS: &[(&str, &str, &str, &str)] = &[
    ("doc-1", "Greeting", "text/plain", "hello world"),
    ("doc-2", "Build notes", GOOGLE_DOC, "rust cargo rust"),
    ("doc-3", "Runbook", "text/markdown", "python deploy"),
    ("empty", "Blank", "text/plain", "   "),
    ("toxic", "Bad", "text/plain", "poison pill"),
];

#[derive(Default)]
pub struct Upstream {
    pub embed_calls: AtomicUsize,
    pub flaky_seen: AtomicBool,
    pub upserts: AtomicUsize,
    pub vectors: Mutex<HashMap<String, (Vec<f32>, Value)>>,
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    VOCAB
        .iter()
        .map(|w| lower.split_whitespace().filter(|t| t == w).count() as f32)
        .collect()
}

pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Start every mock upstream on one port.
///
/// Paths: `/drive/v3/...`, `/v1/embeddings`, `/vectors/upsert`, `/query`,
/// `/oauth/token`, `/oauth/userinfo`.
pub async fn spawn_upstream() -> (String, Arc<Upstream>) {
    let state = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/drive/v3/files", get(drive_list))
        .route("/drive/v3/files/{id}", get(drive_file))
        .route("/drive/v3/files/{id}/export", get(drive_export))
        .route("/v1/embeddings", post(openai_embed))
        .route("/vectors/upsert", post(pinecone_upsert))
        .route("/query", post(pinecone_query))
        .route("/describe_index_stats", post(pinecone_stats))
        .route("/oauth/token", post(oauth_token))
        .route("/oauth/userinfo", get(oauth_userinfo))
        .with_state(state.clone());
    (spawn(app).await, state)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn find_doc(id: &str) -> Option<&'static (&'static str, &'static str, &'static str, &'static str)> {
    DOCS.iter().find(|d| d.0 == id)
}

fn doc_json(doc: &(&str, &str, &str, &str)) -> Value {
    json!({
        "id": doc.0,
        "name": doc.1,
        "mimeType": doc.2,
        "webViewLink": format!("https://docs.google.com/d/{}", doc.0),
        "modifiedTime": "2024-03-01T12:00:00.000Z",
    })
}

async fn drive_list(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
    if bearer(&headers) != Some(DRIVE_TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let filter = q.get("q").cloned().unwrap_or_default();
    let files: Vec<Value> = DOCS
        .iter()
        .filter(|d| filter.contains(&format!("mimeType='{}'", d.2)))
        .map(doc_json)
        .collect();
    Json(json!({ "files": files })).into_response()
}

async fn drive_file(
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if bearer(&headers) != Some(DRIVE_TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id == "throttled" {
        return drive_forbidden("userRateLimitExceeded");
    }
    if id == "private" {
        return drive_forbidden("insufficientFilePermissions");
    }
    let Some(doc) = find_doc(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if q.get("alt").map(String::as_str) == Some("media") {
        if doc.2 == GOOGLE_DOC {
            return (StatusCode::BAD_REQUEST, "fileNotDownloadable").into_response();
        }
        return doc.3.into_response();
    }
    Json(doc_json(doc)).into_response()
}

fn drive_forbidden(reason: &str) -> Response {
    let body = json!({
        "error": {
            "code": 403,
            "message": "forbidden",
            "errors": [{ "domain": "global", "reason": reason }]
        }
    });
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}

async fn drive_export(
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if bearer(&headers) != Some(DRIVE_TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Some(doc) = find_doc(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if doc.2 != GOOGLE_DOC || q.get("mimeType").map(String::as_str) != Some("text/plain") {
        return (StatusCode::BAD_REQUEST, "exportNotSupported").into_response();
    }
    doc.3.into_response()
}

async fn openai_embed(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if bearer(&headers) != Some(OPENAI_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    up.embed_calls.fetch_add(1, Ordering::SeqCst);
    let input = body["input"].as_str().unwrap_or_default();
    if input.contains("poison") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded").into_response();
    }
    if input.contains("flaky") && !up.flaky_seen.swap(true, Ordering::SeqCst) {
        return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
    }
    if input.contains("forbidden") {
        return (StatusCode::BAD_REQUEST, "content policy").into_response();
    }
    Json(json!({
        "data": [{ "embedding": embed_text(input), "index": 0 }],
        "model": body["model"],
    }))
    .into_response()
}

async fn pinecone_upsert(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("api-key").and_then(|v| v.to_str().ok()) != Some(PINECONE_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let vectors = body["vectors"].as_array().cloned().unwrap_or_default();
    let mut store = up.vectors.lock().unwrap();
    for v in &vectors {
        let values: Vec<f32> = serde_json::from_value(v["values"].clone()).unwrap();
        store.insert(
            v["id"].as_str().unwrap().to_string(),
            (values, v["metadata"].clone()),
        );
    }
    up.upserts.fetch_add(vectors.len(), Ordering::SeqCst);
    Json(json!({ "upsertedCount": vectors.len() })).into_response()
}

async fn pinecone_stats(State(up): State<Arc<Upstream>>, headers: HeaderMap) -> Response {
    if headers.get("api-key").and_then(|v| v.to_str().ok()) != Some(PINECONE_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let count = up.vectors.lock().unwrap().len();
    Json(json!({
        "dimension": VOCAB.len(),
        "namespaces": {},
        "totalVectorCount": count,
    }))
    .into_response()
}

async fn pinecone_query(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("api-key").and_then(|v| v.to_str().ok()) != Some(PINECONE_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let query: Vec<f32> = serde_json::from_value(body["vector"].clone()).unwrap();
    let top_k = body["topK"].as_u64().unwrap_or(10) as usize;

    let store = up.vectors.lock().unwrap();
    let mut scored: Vec<(String, f32, Value)> = store
        .iter()
        .map(|(id, (v, meta))| {
            let dot: f32 = v.iter().zip(&query).map(|(a, b)| a * b).sum();
            (id.clone(), dot, meta.clone())
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
    scored.truncate(top_k);

    let matches: Vec<Value> = scored
        .into_iter()
        .map(|(id, score, metadata)| json!({ "id": id, "score": score, "metadata": metadata }))
        .collect();
    Json(json!({ "matches": matches, "namespace": "" })).into_response()
}

async fn oauth_token(Form(form): Form<HashMap<String, String>>) -> Response {
    if form.get("code").map(String::as_str) != Some("good-code")
        || form.get("client_secret").map(String::as_str) != Some("shh")
        || form.get("grant_type").map(String::as_str) != Some("authorization_code")
    {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response();
    }
    Json(json!({ "access_token": "ya29.fresh", "expires_in": 3599, "token_type": "Bearer" }))
        .into_response()
}

async fn oauth_userinfo(headers: HeaderMap) -> Response {
    if bearer(&headers) != Some("ya29.fresh") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "id": "user-1",
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "picture": "https://example.com/ada.png",
    }))
    .into_response()
}
