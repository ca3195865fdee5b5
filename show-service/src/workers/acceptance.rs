//! Background consumer that marks shows accepted from queue messages.
//!
//! Each message carries a show id. The update only matches a show that is
//! not accepted yet, so redelivered or repeated messages are no-ops.

use crate::config::RetryPolicy;
use crate::error::ShowError;
use crate::models::AcceptanceMessage;
use crate::services::{record_acceptance, ShowStore};
use crate::workers::source::{MessageSource, QueueMessage};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceOutcome {
    /// The show flipped to accepted.
    Accepted,
    /// No show matched: unknown id, or already accepted.
    NoOp,
}

impl AcceptanceOutcome {
    fn as_str(self) -> &'static str {
        match self {
            AcceptanceOutcome::Accepted => "accepted",
            AcceptanceOutcome::NoOp => "noop",
        }
    }
}

#[derive(Clone)]
pub struct AcceptanceUpdater {
    store: Arc<dyn ShowStore>,
    retry: RetryPolicy,
}

impl AcceptanceUpdater {
    pub fn new(store: Arc<dyn ShowStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.retry.initial_interval,
            initial_interval: self.retry.initial_interval,
            max_elapsed_time: Some(self.retry.max_elapsed),
            ..Default::default()
        }
    }

    /// Decodes one payload and applies the conditional update.
    pub async fn apply(&self, payload: &[u8]) -> Result<AcceptanceOutcome, ShowError> {
        let message = AcceptanceMessage::from_slice(payload)?;
        let show_id = message.object_id()?;

        if self.store.mark_accepted(show_id).await? {
            tracing::info!(show_id = %show_id, "Updated show to accepted");
            Ok(AcceptanceOutcome::Accepted)
        } else {
            tracing::info!(show_id = %show_id, "No unaccepted show found with id");
            Ok(AcceptanceOutcome::NoOp)
        }
    }

    /// Applies one payload, retrying store failures with exponential backoff
    /// until the retry window closes. Decode and id errors are not retried.
    pub async fn apply_with_retry(&self, payload: &[u8]) -> Result<AcceptanceOutcome, ShowError> {
        retry(self.backoff(), || async move {
            self.apply(payload).await.map_err(|e| {
                if e.is_transient() {
                    tracing::warn!(error = %e, "Store failure, retrying acceptance update");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::Permanent(e)
                }
            })
        })
        .await
    }

    /// Processes one delivery and settles it when the source needs manual acks.
    ///
    /// Undecodable payloads and bad ids are dropped. Store failures are
    /// retried with backoff, then requeued when the broker allows it and
    /// lost otherwise.
    pub async fn handle(&self, message: QueueMessage) {
        tracing::debug!(
            payload = %String::from_utf8_lossy(&message.payload),
            "Received acceptance message"
        );

        let result = self.apply_with_retry(&message.payload).await;

        let requeue = match &result {
            Ok(outcome) => {
                record_acceptance(outcome.as_str());
                None
            }
            Err(e) if e.is_transient() => {
                tracing::error!(error = %e, "Could not update show");
                record_acceptance("failed");
                Some(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping acceptance message");
                record_acceptance("dropped");
                Some(false)
            }
        };

        let Some(acknowledger) = message.acknowledger else {
            return;
        };

        let settled = match requeue {
            None => acknowledger.ack().await,
            Some(requeue) => acknowledger.reject(requeue).await,
        };
        if let Err(e) = settled {
            tracing::error!(error = %e, "Failed to settle acceptance message");
        }
    }

    /// Consumes until the source closes or `shutdown` is cancelled.
    ///
    /// Cancellation is observed between messages; a message already being
    /// handled is finished first, including its retries.
    pub async fn run(self, mut source: Box<dyn MessageSource>, shutdown: CancellationToken) {
        tracing::info!("Acceptance updater started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Acceptance updater shutting down");
                    break;
                }
                next = source.next_message() => {
                    match next {
                        Some(Ok(message)) => self.handle(message).await,
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Message source error");
                        }
                        None => {
                            tracing::warn!("Message source closed, acceptance updater exiting");
                            break;
                        }
                    }
                }
            }
        }
    }
}
