//! HTTP client for the chatter gateway.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway answered {status} before streaming began")]
    Rejected { status: u16 },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Gateway connection configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL.
    pub base_url: String,
    /// Connection timeout for every request.
    pub connect_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Client for the gateway HTTP API.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a new gateway client.
    pub fn new(config: &GatewayConfig) -> Result<Self, ClientError> {
        if config.base_url.is_empty() {
            return Err(ClientError::Config("base_url is empty".into()));
        }

        // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
        // The `Err` case just means it was already installed — safe to ignore.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn answer_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Open the streaming answer for one query.
    ///
    /// The query travels as a JSON-encoded string body. Returns the live
    /// response whose body must be consumed as a byte stream; a non-success
    /// status is surfaced before any bytes flow.
    pub async fn open_answer_stream(&self, query: &str) -> Result<reqwest::Response, ClientError> {
        debug!(query_len = query.len(), "Opening answer stream");
        let resp = self.http.post(self.answer_url()).json(&query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}
