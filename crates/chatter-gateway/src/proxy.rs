//! Pass-through for the backend's management endpoints.
//!
//! Everything that is not the answer stream (source ingestion, model
//! downloads, prompt settings) is forwarded verbatim under
//! `/api/{endpoint}`. Only known endpoint names are forwarded; anything
//! else is a 404, so the gateway never becomes an open proxy.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::backend::BackendError;
use crate::routes::AppState;

/// Endpoints forwarded as plain GETs.
const GET_ENDPOINTS: &[&str] = &[
    "check_sources",
    "ingest",
    "reset_sources",
    "check_language_model",
    "download_language_model",
    "check_embeddings_model",
    "download_embeddings_model",
    "get_prompt_creativity",
    "get_prompt_template",
];

/// Endpoints forwarded as POSTs with the request body intact.
const POST_ENDPOINTS: &[&str] = &[
    "upload_source",
    "set_prompt_creativity",
    "set_prompt_template",
];

/// `GET /api/{endpoint}`
pub async fn proxy_get(Path(endpoint): Path<String>, State(state): State<AppState>) -> Response {
    if !GET_ENDPOINTS.contains(&endpoint.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    debug!(endpoint = %endpoint, "Forwarding GET to backend");
    match state.backend.forward_get(&endpoint).await {
        Ok(proxied) => proxied.into_response(),
        Err(e) => bad_gateway(&endpoint, &e),
    }
}

/// `POST /api/{endpoint}`
pub async fn proxy_post(
    Path(endpoint): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !POST_ENDPOINTS.contains(&endpoint.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    debug!(endpoint = %endpoint, body_len = body.len(), "Forwarding POST to backend");
    match state.backend.forward_post(&endpoint, content_type.as_deref(), body).await {
        Ok(proxied) => proxied.into_response(),
        Err(e) => bad_gateway(&endpoint, &e),
    }
}

fn bad_gateway(endpoint: &str, e: &BackendError) -> Response {
    error!(endpoint = %endpoint, error = %e, "Backend request failed");
    (
        StatusCode::BAD_GATEWAY,
        axum::Json(serde_json::json!({ "error": "backend unavailable" })),
    )
        .into_response()
}
