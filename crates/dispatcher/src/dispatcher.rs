//! Notification dispatcher.
//!
//! Turns one queued record into zero or one multicast push:
//! 1. No record → nothing to do
//! 2. Already sent → nothing to do (at-most-once guard)
//! 3. Wrong type or no tokens → logged and skipped, record untouched
//! 4. Otherwise send, log per-token counts, then retire the record
//!
//! A whole-call send failure leaves the record unsent and is returned to the
//! caller so the hosting trigger can re-deliver. Per-token failures are
//! only logged.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use bingo_common::error::AppError;
use bingo_common::types::{QueueKey, QueuedNotification};

use crate::clock::Clock;
use crate::message::MulticastMessage;
use crate::messaging::{Messaging, MessagingError};
use crate::store::QueueStore;

/// What a dispatch call did with its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The trigger carried no record.
    MissingData,
    /// The record was already retired by an earlier invocation.
    AlreadySent,
    /// The record isn't dispatchable; it was left as is.
    Invalid { reason: String },
    /// The push went out and the record was retired.
    Sent {
        success_count: usize,
        failure_count: usize,
    },
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::MissingData => write!(f, "missing_data"),
            DispatchOutcome::AlreadySent => write!(f, "already_sent"),
            DispatchOutcome::Invalid { .. } => write!(f, "invalid"),
            DispatchOutcome::Sent { .. } => write!(f, "sent"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Push send failed: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Queue store failed: {0}")]
    Store(#[from] AppError),
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Messaging(e) => AppError::Messaging(e.to_string()),
            DispatchError::Store(e) => e,
        }
    }
}

/// Dispatches queued "number called" records to the messaging platform.
pub struct Dispatcher {
    messaging: Arc<dyn Messaging>,
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        messaging: Arc<dyn Messaging>,
        store: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            messaging,
            store,
            clock,
        }
    }

    /// Dispatch a record delivered by a creation trigger.
    ///
    /// `key` identifies the record and supplies its game id. The trigger's
    /// copy can predate an earlier invocation's write, so the stored record's
    /// `sent` flag is consulted as well.
    pub async fn dispatch(
        &self,
        record: Option<&QueuedNotification>,
        key: &QueueKey,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(record) = record else {
            tracing::info!(document = %key, "No data associated with the event");
            return Ok(DispatchOutcome::MissingData);
        };

        if !record.sent {
            match self.store.get(key).await {
                Ok(Some(stored)) if stored.sent => {
                    tracing::debug!(document = %key, "Stored record already sent, skipping");
                    return Ok(DispatchOutcome::AlreadySent);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(document = %key, error = %e, "Failed to load stored record");
                    return Err(e.into());
                }
            }
        }

        self.send_record(record, key).await
    }

    /// Load the record at `key` from the store and dispatch it.
    pub async fn dispatch_stored(&self, key: &QueueKey) -> Result<DispatchOutcome, DispatchError> {
        match self.store.get(key).await? {
            Some(record) => self.send_record(&record, key).await,
            None => {
                tracing::info!(document = %key, "No data associated with the event");
                Ok(DispatchOutcome::MissingData)
            }
        }
    }

    async fn send_record(
        &self,
        record: &QueuedNotification,
        key: &QueueKey,
    ) -> Result<DispatchOutcome, DispatchError> {
        if record.sent {
            tracing::debug!(document = %key, "Notification already sent, skipping");
            return Ok(DispatchOutcome::AlreadySent);
        }

        if let Some(reason) = record.invalid_reason() {
            tracing::info!(document = %key, reason = %reason, "Invalid notification data");
            return Ok(DispatchOutcome::Invalid { reason });
        }

        let message = MulticastMessage::number_called(record, key);

        let response = match self.messaging.send_each_for_multicast(&message).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(document = %key, error = %e, "Error sending notifications");
                return Err(e.into());
            }
        };

        tracing::info!(
            document = %key,
            game_id = %key.game_id,
            success_count = response.success_count,
            failure_count = response.failure_count,
            "Sent number-called notifications"
        );

        if response.failure_count > 0 {
            for (token, result) in message.tokens.iter().zip(&response.responses) {
                if !result.success {
                    tracing::debug!(
                        document = %key,
                        token = %token,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Token delivery failed"
                    );
                }
            }
        }

        if let Err(e) = self.store.mark_sent(key, self.clock.now()).await {
            tracing::error!(document = %key, error = %e, "Failed to mark notification sent");
            return Err(e.into());
        }

        Ok(DispatchOutcome::Sent {
            success_count: response.success_count,
            failure_count: response.failure_count,
        })
    }
}
