//! Axum-based HTTP surface mapping verbs to document-store calls.
//!
//! Every data route passes through the password guard before touching the
//! store; `/home` and `/init-password` are the only ungated paths. The
//! router carries the usual protective layers:
//! - Request body size limits (64KB max)
//! - Request timeouts (30s) to prevent slow-loris abuse
//! - Permissive CORS for browser clients

use crate::auth::{CredentialVerifier, GateError, SecretGate};
use crate::config::Config;
use crate::store::{Document, Store};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use uuid::Uuid;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Request header carrying the shared secret.
pub const PASSWORD_HEADER: &str = "Password";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    /// Credential check applied to every data route. The shipped
    /// implementation is the shared-secret gate, but handlers only see
    /// the trait.
    pub verifier: Arc<dyn CredentialVerifier>,
    pub gate: Arc<SecretGate>,
}

impl AppState {
    pub fn new(store: Arc<Store>) -> Self {
        let gate = Arc::new(SecretGate::new(Arc::clone(&store)));
        Self {
            store,
            verifier: gate.clone(),
            gate,
        }
    }
}

/// Run the HTTP service: open the store, bind, and serve until shutdown.
pub async fn run_gateway(config: &Config) -> Result<()> {
    let db_path = config.db_path();
    let store = Arc::new(Store::open(&db_path)?);
    tracing::info!(db = %db_path.display(), "document store opened");

    let state = AppState::new(store);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let display_addr = listener.local_addr()?;

    println!("docgate listening on http://{display_addr}");
    println!("  POST   /init-password — one-time password setup");
    println!("  GET    /home          — liveness check");
    println!("  POST   /data          — create document (Password header)");
    println!("  GET    /data          — list documents (Password header)");
    println!("  GET    /data/{{id}}     — fetch document (Password header)");
    println!("  PUT    /data/{{id}}     — merge fields (Password header)");
    println!("  DELETE /data/{{id}}     — delete document (Password header)");
    println!("  Press Ctrl+C to stop.\n");

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

/// Build the application router with all layers applied.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("password"),
        ]);

    Router::new()
        .route("/init-password", post(handle_init_password))
        .route("/home", get(handle_home))
        .route("/data", post(handle_create))
        .route("/data", get(handle_list))
        .route("/data/{id}", get(handle_read))
        .route("/data/{id}", put(handle_update))
        .route("/data/{id}", delete(handle_delete))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Concrete return type for handlers (avoids `impl IntoResponse` inference issues).
type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Any underlying store fault: logged, converted to a generic 500, never retried.
fn storage_error(err: impl std::fmt::Display) -> ApiResponse {
    tracing::error!("storage failure: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Internal storage error"})),
    )
}

fn bad_request(message: impl std::fmt::Display) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message.to_string()})),
    )
}

fn not_found() -> ApiResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Data not found"})),
    )
}

/// Guard composed in front of every data handler. Reads the `Password`
/// header and short-circuits with 403 unless the credential verifies.
/// The rejection is deliberately generic: callers cannot distinguish a
/// missing credential from a wrong one.
fn require_password(state: &AppState, headers: &HeaderMap) -> Result<(), ApiResponse> {
    let presented = headers
        .get(PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match state.verifier.verify(presented) {
        Ok(true) => Ok(()),
        Ok(false) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Invalid or missing password"})),
        )),
        Err(e) => Err(storage_error(e)),
    }
}

/// Convert a path token into a canonical document identifier.
fn parse_document_id(token: &str) -> Result<String, ApiResponse> {
    match Uuid::parse_str(token) {
        Ok(id) => Ok(id.to_string()),
        Err(_) => Err(bad_request("Invalid document id")),
    }
}

/// Render a stored document for transport, identifier inlined as text.
fn render(id: String, mut doc: Document) -> Document {
    doc.insert("_id".into(), serde_json::Value::String(id));
    doc
}

/// Request body for password initialization.
#[derive(Debug, Default, Deserialize)]
struct InitPasswordBody {
    #[serde(default)]
    password: Option<String>,
}

/// POST /init-password — one-time setup of the shared secret.
async fn handle_init_password(
    State(state): State<AppState>,
    body: Result<Json<InitPasswordBody>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_request(format!("Invalid request: {e}")),
    };

    match state.gate.initialize(body.password.as_deref().unwrap_or("")) {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({"message": "Password initialized successfully"})),
        ),
        Err(e @ (GateError::AlreadyInitialized | GateError::MissingCredential)) => bad_request(e),
        Err(GateError::Store(e)) => storage_error(e),
    }
}

/// GET /home — ungated liveness check.
async fn handle_home() -> ApiResponse {
    (
        StatusCode::OK,
        Json(json!({"message": "Application working successfully!"})),
    )
}

/// POST /data — insert an arbitrary JSON document.
async fn handle_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Document>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    if let Err(rejection) = require_password(&state, &headers) {
        return rejection;
    }

    let doc = match body {
        Ok(Json(d)) => d,
        Err(e) => return bad_request(format!("Invalid request: {e}")),
    };

    match state.store.insert(&doc) {
        Ok(id) => (
            StatusCode::CREATED,
            Json(json!({"message": "Data created successfully", "id": id})),
        ),
        Err(e) => storage_error(e),
    }
}

/// GET /data/{id} — fetch a single document.
async fn handle_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> ApiResponse {
    if let Err(rejection) = require_password(&state, &headers) {
        return rejection;
    }
    let id = match parse_document_id(&token) {
        Ok(id) => id,
        Err(rejection) => return rejection,
    };

    match state.store.get(&id) {
        Ok(Some(doc)) => (StatusCode::OK, Json(render(id, doc).into())),
        Ok(None) => not_found(),
        Err(e) => storage_error(e),
    }
}

/// PUT /data/{id} — field-level merge into an existing document.
async fn handle_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
    body: Result<Json<Document>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    if let Err(rejection) = require_password(&state, &headers) {
        return rejection;
    }
    let id = match parse_document_id(&token) {
        Ok(id) => id,
        Err(rejection) => return rejection,
    };
    let partial = match body {
        Ok(Json(d)) => d,
        Err(e) => return bad_request(format!("Invalid request: {e}")),
    };

    match state.store.merge(&id, &partial) {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({"message": "Data updated successfully"})),
        ),
        Ok(false) => not_found(),
        Err(e) => storage_error(e),
    }
}

/// DELETE /data/{id} — remove a document.
async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> ApiResponse {
    if let Err(rejection) = require_password(&state, &headers) {
        return rejection;
    }
    let id = match parse_document_id(&token) {
        Ok(id) => id,
        Err(rejection) => return rejection,
    };

    match state.store.remove(&id) {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({"message": "Data deleted successfully"})),
        ),
        Ok(false) => not_found(),
        Err(e) => storage_error(e),
    }
}

/// GET /data — every document in the collection, natural iteration order.
async fn handle_list(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    if let Err(rejection) = require_password(&state, &headers) {
        return rejection;
    }

    match state.store.list() {
        Ok(documents) => {
            let rendered: Vec<serde_json::Value> = documents
                .into_iter()
                .map(|(id, doc)| render(id, doc).into())
                .collect();
            (StatusCode::OK, Json(serde_json::Value::Array(rendered)))
        }
        Err(e) => storage_error(e),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
