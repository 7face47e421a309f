//! Interactive mode.
//!
//! Reads queries from stdin and streams answers to stdout. A new query may
//! be typed while an answer is still streaming; submitting it supersedes the
//! exchange in flight.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::exchange::{ExchangeOutcome, Message};
use crate::session::Session;

/// Interactive mode errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the interactive loop until stdin closes or the user quits.
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub async fn run(session: &mut Session) -> Result<(), ReplError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0;

    eprintln!("Type a query and press enter; /quit exits.");
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let query = line.trim();
                if query.is_empty() {
                    prompt();
                    continue;
                }
                if query == "/quit" || query == "/exit" {
                    break;
                }
                if session.current_mut().is_some() {
                    // Typing ahead replaces the answer in flight.
                    println!();
                    info!("Superseding the answer in flight");
                }
                printed = 0;
                if let Err(e) = session.submit(query).await {
                    eprintln!("[Error: {e}]");
                    prompt();
                }
            }
            live = next_update(session) => {
                let Some(handle) = session.current_mut() else { continue };
                let snapshot = handle.snapshot();
                if snapshot.text.len() > printed {
                    print!("{}", &snapshot.text[printed..]);
                    let _ = std::io::stdout().flush();
                    printed = snapshot.text.len();
                }
                if snapshot.is_complete || !live {
                    let outcome = handle.wait().await;
                    report_outcome(&outcome, &snapshot);
                    session.take_current();
                    prompt();
                }
            }
        }
    }

    if let Some(handle) = session.take_current() {
        handle.abort().await;
    }
    Ok(())
}

/// Wait for the live exchange's next update; parked while none is in flight.
async fn next_update(session: &mut Session) -> bool {
    match session.current_mut() {
        Some(handle) => handle.changed().await,
        None => std::future::pending().await,
    }
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn report_outcome(outcome: &ExchangeOutcome, snapshot: &Message) {
    println!();
    match outcome {
        ExchangeOutcome::Completed { degraded } => {
            if *degraded {
                eprintln!("[Answer stream ended early; the reply may be incomplete]");
            }
            if !snapshot.source.is_empty() {
                eprintln!("[Sources: {}]", snapshot.source.join(", "));
            }
        }
        ExchangeOutcome::Aborted { reason } => {
            eprintln!("[Exchange aborted: {reason}]");
        }
    }
}

#[allow(clippy::print_stderr)]
fn prompt() {
    eprint!("> ");
}
