//! HTTP client for the model backend.
//!
//! The backend exposes one streaming endpoint, `/get_answer`, plus a set of
//! plain request/response management endpoints the gateway passes through.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Backend client errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend answered {status} before streaming began")]
    AnswerRejected { status: u16 },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for connecting to the model backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend base URL (e.g., "<http://127.0.0.1:5000>").
    pub base_url: String,
    /// Connection timeout for every backend request.
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Client for the model backend HTTP API.
#[derive(Debug, Clone)]
pub struct Backend {
    http: reqwest::Client,
    base_url: String,
}

impl Backend {
    /// Create a new backend client.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        if config.base_url.is_empty() {
            return Err(BackendError::Config("base_url is empty".into()));
        }

        // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
        // The `Err` case just means it was already installed — safe to ignore.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    /// Build the URL for a backend endpoint.
    pub(crate) fn endpoint_url(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    /// Open the streaming answer for one query.
    ///
    /// The query travels as a JSON-encoded string body. Returns the live
    /// response whose body must be consumed as a byte stream; a non-success
    /// status is surfaced before any bytes flow downstream.
    pub async fn open_answer_stream(&self, query: &str) -> Result<reqwest::Response, BackendError> {
        let resp = self
            .http
            .post(self.endpoint_url("get_answer"))
            .json(&query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::AnswerRejected {
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    /// Forward a GET to a management endpoint, buffered.
    pub async fn forward_get(&self, name: &str) -> Result<ProxiedResponse, BackendError> {
        let resp = self.http.get(self.endpoint_url(name)).send().await?;
        Self::buffer_response(resp).await
    }

    /// Forward a POST body to a management endpoint, buffered.
    pub async fn forward_post(
        &self,
        name: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<ProxiedResponse, BackendError> {
        let mut req = self.http.post(self.endpoint_url(name)).body(body);
        if let Some(ct) = content_type {
            req = req.header(header::CONTENT_TYPE, ct);
        }
        let resp = req.send().await?;
        Self::buffer_response(resp).await
    }

    async fn buffer_response(resp: reqwest::Response) -> Result<ProxiedResponse, BackendError> {
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes().await?;
        Ok(ProxiedResponse {
            status,
            content_type,
            body,
        })
    }
}

/// A buffered backend response, relayed to the caller untouched.
#[derive(Debug)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl IntoResponse for ProxiedResponse {
    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status);
        if let Some(ct) = self.content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}
