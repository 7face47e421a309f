//! Chatter Core Library
//!
//! Shared functionality for chatter components:
//! - Fragment wire type for the backend answer stream
//! - SSE event framing and chunk re-framing for the relay pipeline
//! - Common error types

pub mod error;
pub mod fragment;
pub mod frame;
pub mod tracing_init;

pub use error::{Error, Result};
pub use fragment::Fragment;
