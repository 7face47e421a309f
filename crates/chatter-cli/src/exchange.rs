//! One query/answer exchange.
//!
//! Folds the gateway's event stream into a growing [`Message`] and publishes
//! each change on a watch channel. The loop is single and sequential: wait
//! for the next network chunk, absorb every complete event it finishes, then
//! wait again. Cancellation is checked ahead of each suspension.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatter_core::Fragment;
use chatter_core::frame::{self, ChunkBuffer};

/// The answer as assembled so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Concatenated answer text.
    pub text: String,
    /// Source documents, as last reported by the backend.
    pub source: Vec<String>,
    /// Whether the answer is finished.
    pub is_complete: bool,
}

impl Message {
    /// Fold one fragment into the message.
    ///
    /// Answer text appends; a non-empty source list replaces the previous
    /// one; `done` latches completion. Returns whether anything changed, so
    /// callers can skip publishing no-op snapshots.
    pub fn merge(&mut self, fragment: &Fragment) -> bool {
        let mut changed = false;
        if !fragment.answer.is_empty() {
            self.text.push_str(&fragment.answer);
            changed = true;
        }
        if !fragment.source.is_empty() && self.source != fragment.source {
            self.source.clone_from(&fragment.source);
            changed = true;
        }
        if fragment.done && !self.is_complete {
            self.is_complete = true;
            changed = true;
        }
        changed
    }
}

/// Why an exchange ended without a finished answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Superseded by a newer query or torn down by the caller.
    Cancelled,
    /// Nothing arrived from the gateway within the idle window.
    IdleTimeout,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::IdleTimeout => f.write_str("no data before the idle deadline"),
        }
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The answer finished. `degraded` marks streams that ended without a
    /// final `done` fragment; the text shown is everything that arrived.
    Completed { degraded: bool },
    /// The exchange stopped before the answer finished.
    Aborted { reason: AbortReason },
}

/// Drive one exchange to its outcome.
///
/// Every change to the assembled message is published on `updates`; the last
/// snapshot before returning is final. Once a `done` fragment is absorbed
/// the exchange returns immediately; events still buffered behind it are
/// never examined.
pub async fn run<S, B, E>(
    stream: S,
    updates: watch::Sender<Message>,
    cancel: CancellationToken,
    idle_timeout: Duration,
) -> ExchangeOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    tokio::pin!(stream);
    let mut buf = ChunkBuffer::events();
    let mut message = Message::default();

    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(chars = message.text.len(), "Exchange cancelled");
                return ExchangeOutcome::Aborted { reason: AbortReason::Cancelled };
            }
            next = tokio::time::timeout(idle_timeout, stream.next()) => match next {
                Err(_) => {
                    error!(chars = message.text.len(), "No data from the gateway, abandoning the exchange");
                    return ExchangeOutcome::Aborted { reason: AbortReason::IdleTimeout };
                }
                Ok(None) => {
                    // An event cut off right before its delimiter can still
                    // be decoded; anything less falls out as a decode skip.
                    if let Some(unit) = buf.finish() {
                        if absorb(unit, &mut message, &updates) {
                            info!(chars = message.text.len(), "Answer complete");
                            return ExchangeOutcome::Completed { degraded: false };
                        }
                    }
                    return finish_degraded(&mut message, &updates);
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, chars = message.text.len(), "Stream failed, keeping what arrived");
                    return finish_degraded(&mut message, &updates);
                }
                Ok(Some(Ok(chunk))) => chunk,
            },
        };

        buf.push(chunk.as_ref());
        while let Some(unit) = buf.next_unit() {
            if absorb(unit, &mut message, &updates) {
                info!(chars = message.text.len(), "Answer complete");
                return ExchangeOutcome::Completed { degraded: false };
            }
        }
    }
}

/// Decode one event payload and fold it into the message.
///
/// Returns `true` when the fragment was the final one. Undecodable or
/// malformed events are skipped; assembly continues with the next event.
fn absorb(
    unit: chatter_core::Result<String>,
    message: &mut Message,
    updates: &watch::Sender<Message>,
) -> bool {
    let payload = match unit {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Skipping undecodable event bytes");
            return false;
        }
    };
    if payload.is_empty() {
        return false;
    }
    let fragment = match frame::decode_event(&payload) {
        Ok(fragment) => fragment,
        Err(e) => {
            debug!(error = %e, "Skipping malformed event");
            return false;
        }
    };
    if message.merge(&fragment) {
        let _ = updates.send(message.clone());
    }
    fragment.done
}

fn finish_degraded(message: &mut Message, updates: &watch::Sender<Message>) -> ExchangeOutcome {
    info!(
        chars = message.text.len(),
        "Stream ended without a final fragment, treating the answer as finished"
    );
    if !message.is_complete {
        message.is_complete = true;
        let _ = updates.send(message.clone());
    }
    ExchangeOutcome::Completed { degraded: true }
}
