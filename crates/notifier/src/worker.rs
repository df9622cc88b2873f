use std::sync::Arc;
use std::time::Duration;

use bingo_common::error::AppError;
use bingo_common::types::QueueKey;
use bingo_dispatcher::{DispatchOutcome, Dispatcher};

use crate::trigger::{TriggerEvent, TriggerQueue};

/// How long one `BRPOP` blocks before the loop comes back around.
const POLL_TIMEOUT_SECS: u64 = 1;

/// Pause after a failed Redis call before trying again.
const REDIS_RETRY_DELAY: Duration = Duration::from_secs(2);

/// What to do with an event after handling it.
#[derive(Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Dispatch ran to completion (whatever the outcome).
    Done(DispatchOutcome),
    /// Dispatch failed; put this event back on the queue.
    Retry(TriggerEvent),
    /// Give up on this payload and park it.
    DeadLetter { payload: String, reason: String },
}

/// Decode one raw trigger payload and dispatch the record it points at.
pub async fn handle_event(dispatcher: &Dispatcher, raw: &str, max_attempts: u32) -> Disposition {
    let event: TriggerEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed trigger event");
            return Disposition::DeadLetter {
                payload: raw.to_string(),
                reason: format!("malformed event: {}", e),
            };
        }
    };

    let Some(key) = QueueKey::parse(&event.document) else {
        tracing::warn!(document = %event.document, "Trigger event for unrecognized document path");
        return Disposition::DeadLetter {
            payload: raw.to_string(),
            reason: format!("unrecognized document path '{}'", event.document),
        };
    };

    match dispatcher.dispatch_stored(&key).await {
        Ok(outcome) => {
            tracing::debug!(document = %key, outcome = %outcome, "Trigger event handled");
            Disposition::Done(outcome)
        }
        Err(e) => {
            let retry = event.retried();
            if retry.attempt < max_attempts {
                tracing::warn!(
                    document = %key,
                    attempt = retry.attempt,
                    max_attempts,
                    error = %e,
                    "Dispatch failed, re-queueing"
                );
                Disposition::Retry(retry)
            } else {
                tracing::error!(
                    document = %key,
                    attempts = retry.attempt,
                    error = %e,
                    "Dispatch failed, giving up"
                );
                let payload = serde_json::to_string(&retry).unwrap_or_else(|_| raw.to_string());
                Disposition::DeadLetter {
                    payload,
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Repeat a queue write until Redis accepts it.
///
/// The event was already popped, so giving up here would lose it.
async fn until_stored<F, Fut>(action: &str, delay: Duration, mut write: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let mut failures: u32 = 0;
    loop {
        match write().await {
            Ok(()) => return,
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    action,
                    failures,
                    error = %e,
                    "Failed to write trigger queue, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Long-running consumer of the trigger queue.
pub struct NotificationWorker {
    dispatcher: Arc<Dispatcher>,
    queue: TriggerQueue,
    max_attempts: u32,
}

impl NotificationWorker {
    pub fn new(dispatcher: Arc<Dispatcher>, queue: TriggerQueue, max_attempts: u32) -> Self {
        Self {
            dispatcher,
            queue,
            max_attempts,
        }
    }

    /// Consume events until the task is cancelled.
    pub async fn run(&mut self) {
        tracing::info!(
            queue = %self.queue.key(),
            dead_letter = %self.queue.dead_letter_key(),
            max_attempts = self.max_attempts,
            "Notification worker started"
        );

        loop {
            let raw = match self.queue.next(POLL_TIMEOUT_SECS).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read trigger queue, retrying");
                    tokio::time::sleep(REDIS_RETRY_DELAY).await;
                    continue;
                }
            };

            self.process(&raw).await;
        }
    }

    /// Handle one raw payload and apply its disposition to the queue.
    pub async fn process(&mut self, raw: &str) {
        match handle_event(&self.dispatcher, raw, self.max_attempts).await {
            Disposition::Done(_) => {}
            Disposition::Retry(event) => {
                let queue = &self.queue;
                until_stored("re-queue", REDIS_RETRY_DELAY, || {
                    let mut queue = queue.clone();
                    let event = event.clone();
                    async move { queue.push(&event).await }
                })
                .await;
            }
            Disposition::DeadLetter { payload, reason } => {
                tracing::warn!(reason = %reason, "Moving trigger event to dead-letter list");
                let queue = &self.queue;
                until_stored("dead-letter", REDIS_RETRY_DELAY, || {
                    let mut queue = queue.clone();
                    let payload = payload.clone();
                    async move { queue.dead_letter(&payload).await }
                })
                .await;
            }
        }
    }
}
