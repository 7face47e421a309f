//! Error types for the chatter core library.

use thiserror::Error;

/// Result type alias using chatter Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for chatter operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Event frame decoding error
    #[error("Failed to decode event frame: {0}")]
    FrameDecode(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
