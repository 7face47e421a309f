//! Headless (non-interactive) mode.
//!
//! Sends one query to the gateway and streams the answer to stdout.

use std::io::Write;

use tracing::info;

use crate::client::ClientError;
use crate::exchange::{AbortReason, ExchangeOutcome};
use crate::session::Session;

/// Headless mode configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Query to send.
    pub query: String,
    /// Print the answer's source documents when present.
    pub show_sources: bool,
}

/// Run headless mode.
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub async fn run(session: &mut Session, config: HeadlessConfig) -> Result<(), HeadlessError> {
    let handle = session.submit(&config.query).await?;
    info!(exchange = %handle.id(), "Headless mode started");

    let mut printed = 0;
    loop {
        let snapshot = handle.snapshot();
        if snapshot.text.len() > printed {
            // Text only ever grows, so the unseen suffix is safe to slice.
            print!("{}", &snapshot.text[printed..]);
            let _ = std::io::stdout().flush();
            printed = snapshot.text.len();
        }
        if snapshot.is_complete {
            break;
        }
        if !handle.changed().await {
            break;
        }
    }
    println!();

    let snapshot = handle.snapshot();
    if config.show_sources && !snapshot.source.is_empty() {
        eprintln!("[Sources: {}]", snapshot.source.join(", "));
    }

    match handle.wait().await {
        ExchangeOutcome::Completed { degraded: false } => Ok(()),
        ExchangeOutcome::Completed { degraded: true } => {
            eprintln!("[Answer stream ended early; the reply may be incomplete]");
            Ok(())
        }
        ExchangeOutcome::Aborted { reason } => Err(HeadlessError::Aborted(reason)),
    }
}

/// Headless mode errors.
#[derive(Debug, thiserror::Error)]
pub enum HeadlessError {
    #[error("Connection error: {0}")]
    Connection(#[from] ClientError),

    #[error("Exchange aborted: {0}")]
    Aborted(AbortReason),
}
