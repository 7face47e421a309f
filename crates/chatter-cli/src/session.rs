//! Gateway session: one live exchange at a time.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::client::{ClientError, GatewayClient};
use crate::exchange::{self, AbortReason, ExchangeOutcome, Message};

/// A caller's conversation with the gateway.
///
/// Holds at most one live exchange. Submitting a new query aborts the
/// previous exchange, and with it the gateway connection, before the new
/// stream opens.
pub struct Session {
    client: GatewayClient,
    idle_timeout: Duration,
    current: Option<ExchangeHandle>,
}

impl Session {
    pub fn new(client: GatewayClient, idle_timeout: Duration) -> Self {
        Self {
            client,
            idle_timeout,
            current: None,
        }
    }

    /// Submit a query, superseding any exchange still in flight.
    pub async fn submit(&mut self, query: &str) -> Result<&mut ExchangeHandle, ClientError> {
        if let Some(previous) = self.current.take() {
            let outcome = previous.abort().await;
            info!(?outcome, "Superseded previous exchange");
        }

        let id = Uuid::new_v4();
        info!(exchange = %id, query_len = query.len(), "Submitting query");
        let response = self.client.open_answer_stream(query).await?;

        let cancel = CancellationToken::new();
        let (tx, updates) = watch::channel(Message::default());
        let task = tokio::spawn(exchange::run(
            response.bytes_stream(),
            tx,
            cancel.clone(),
            self.idle_timeout,
        ));

        Ok(self.current.insert(ExchangeHandle {
            id,
            query: query.to_string(),
            cancel,
            updates,
            task,
            outcome: None,
        }))
    }

    /// The exchange currently in flight, if any.
    pub fn current_mut(&mut self) -> Option<&mut ExchangeHandle> {
        self.current.as_mut()
    }

    /// Detach the current exchange from the session.
    pub fn take_current(&mut self) -> Option<ExchangeHandle> {
        self.current.take()
    }
}

/// Handle to a spawned exchange.
#[derive(Debug)]
pub struct ExchangeHandle {
    id: Uuid,
    query: String,
    cancel: CancellationToken,
    updates: watch::Receiver<Message>,
    task: JoinHandle<ExchangeOutcome>,
    outcome: Option<ExchangeOutcome>,
}

impl ExchangeHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Latest assembled snapshot.
    pub fn snapshot(&self) -> Message {
        self.updates.borrow().clone()
    }

    /// Wait for the snapshot to change. Returns `false` once the exchange
    /// has published its last update.
    pub async fn changed(&mut self) -> bool {
        self.updates.changed().await.is_ok()
    }

    /// Wait for the exchange to finish on its own.
    pub async fn wait(&mut self) -> ExchangeOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        let outcome = match (&mut self.task).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(exchange = %self.id, error = %e, "Exchange task failed");
                ExchangeOutcome::Aborted {
                    reason: AbortReason::Cancelled,
                }
            }
        };
        self.outcome = Some(outcome);
        outcome
    }

    /// Stop the exchange and wait for it to wind down. The gateway
    /// connection is released as the task drops its stream.
    pub async fn abort(mut self) -> ExchangeOutcome {
        self.cancel.cancel();
        self.wait().await
    }
}

impl Drop for ExchangeHandle {
    fn drop(&mut self) {
        // A handle dropped without an explicit abort still winds the task down.
        self.cancel.cancel();
    }
}
