//! Fragment wire type for the backend answer stream.
//!
//! The model backend emits one JSON object per answer token, newline-delimited.
//! Implements tolerant reader pattern: unknown fields ignored, missing fields
//! defaulted.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One incremental unit of model output plus metadata.
///
/// Every fragment of an exchange echoes the model name and the originating
/// query; `answer` carries the text delta to append and `done` marks the
/// last fragment of the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Name of the model that produced this fragment.
    #[serde(default)]
    pub model: String,

    /// Echo of the originating query, for correlation.
    #[serde(default)]
    pub query: String,

    /// Incremental answer text to append. May be empty.
    #[serde(default)]
    pub answer: String,

    /// Reference document names backing the answer. May be empty.
    #[serde(default)]
    pub source: Vec<String>,

    /// True on the last fragment of the exchange.
    #[serde(default)]
    pub done: bool,
}

impl Fragment {
    /// Parse one fragment JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
