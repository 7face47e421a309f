//! The answer relay: `POST /api/generate`.
//!
//! Data flow:
//! ```text
//! caller query → backend /get_answer → fragment lines → filter → SSE events → caller
//! ```
//!
//! One sequential forwarding loop per request: suspend on the next upstream
//! chunk, re-frame buffered bytes into complete fragment lines, apply the
//! forwarding policy, and emit each kept line as one SSE event. Dropping the
//! response body (caller disconnect) drops the loop and the upstream
//! connection with it.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use chatter_core::Fragment;
use chatter_core::frame::{self, ChunkBuffer};

use crate::routes::AppState;

/// `POST /api/generate`: stream the backend's answer to the caller as SSE.
pub async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    let query: String = match serde_json::from_slice(&body) {
        Ok(q) => q,
        Err(e) => {
            warn!(error = %e, "Rejecting request body that is not a JSON string");
            return (
                StatusCode::BAD_REQUEST,
                "body must be a JSON-encoded query string",
            )
                .into_response();
        }
    };
    if query.is_empty() {
        return (StatusCode::BAD_REQUEST, "query must not be empty").into_response();
    }

    let upstream = match state.backend.open_answer_stream(&query).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "Could not open backend answer stream");
            return (StatusCode::BAD_GATEWAY, "backend unavailable").into_response();
        }
    };

    info!(query_len = query.len(), "Answer stream opened");

    sse_response(forward_fragments(upstream, state.idle_timeout))
}

/// Build the caller-facing streaming response with the exact header set the
/// browser client expects.
fn sse_response(
    stream: impl Stream<Item = Result<String, Infallible>> + Send + 'static,
) -> Response {
    let built = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-store, no-cache, no-transform")
        .header(header::CONNECTION, "keep-alive")
        .header(header::CONTENT_ENCODING, "none")
        .body(Body::from_stream(stream));
    match built {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "Failed to build stream response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Translate the backend byte stream into SSE events.
///
/// The backend's final fragment carries no trailing newline, so the line
/// buffer is flushed once the upstream ends cleanly. After a mid-stream
/// error or idle timeout nothing more is forwarded; a partial line would be
/// truncated data, not a fragment.
fn forward_fragments(
    upstream: reqwest::Response,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    async_stream::stream! {
        let mut guard = StreamGuard::new();
        let mut chunks = upstream.bytes_stream();
        let mut buf = ChunkBuffer::lines();
        let mut ended_cleanly = false;

        loop {
            let chunk = match tokio::time::timeout(idle_timeout, chunks.next()).await {
                Err(_) => {
                    error!(forwarded = guard.forwarded, "Backend stream idle timeout, closing");
                    break;
                }
                Ok(None) => {
                    ended_cleanly = true;
                    break;
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, forwarded = guard.forwarded, "Backend stream error, closing");
                    break;
                }
                Ok(Some(Ok(bytes))) => bytes,
            };

            buf.push(&chunk);
            while let Some(unit) = buf.next_unit() {
                if let Some(event) = frame_line(unit) {
                    guard.forwarded += 1;
                    yield Ok(event);
                }
            }
        }

        if ended_cleanly {
            if let Some(unit) = buf.finish() {
                if let Some(event) = frame_line(unit) {
                    guard.forwarded += 1;
                    yield Ok(event);
                }
            }
        }

        guard.complete();
    }
}

/// Apply the forwarding policy to one complete backend unit.
///
/// Keep-alive newlines arrive as empty units and are dropped. A fragment
/// that parses with an empty answer is dropped so no-op events are never
/// emitted, even when it carries `done`; the caller's end-of-stream
/// handling covers completion in that case. A line that does not parse as a
/// fragment is forwarded untouched, preserving stream order and content.
fn frame_line(unit: chatter_core::Result<String>) -> Option<String> {
    let line = match unit {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "Skipping undecodable backend bytes");
            return None;
        }
    };
    if line.is_empty() {
        debug!("Dropping keep-alive");
        return None;
    }
    match Fragment::parse(&line) {
        Ok(frag) if frag.answer.is_empty() => {
            debug!(done = frag.done, "Dropping empty-delta fragment");
            None
        }
        Ok(_) => Some(frame::encode_event(&line)),
        Err(e) => {
            debug!(error = %e, "Forwarding unparseable backend line as-is");
            Some(frame::encode_event(&line))
        }
    }
}

/// Tracks how a forwarding loop ended.
///
/// If the loop's future is dropped before `complete` runs, the caller went
/// away mid-stream; the upstream response is released by the same drop.
struct StreamGuard {
    forwarded: u64,
    completed: bool,
}

impl StreamGuard {
    const fn new() -> Self {
        Self {
            forwarded: 0,
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
        info!(forwarded = self.forwarded, "Answer stream finished");
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if !self.completed {
            info!(
                forwarded = self.forwarded,
                "Caller disconnected, upstream connection released"
            );
        }
    }
}
