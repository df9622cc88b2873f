//! Record-creation events carried on a Redis list.
//!
//! Producers `LPUSH`, the worker `BRPOP`s, so events are consumed in the
//! order they were created. Re-queued events go to the back of the line.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use bingo_common::error::AppError;
use bingo_common::types::QueueKey;

/// Suffix appended to the trigger list key to name its dead-letter list.
const DEAD_LETTER_SUFFIX: &str = ":dead";

/// One "record created" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Document path of the created record.
    pub document: String,
    /// Delivery attempts already made for this event.
    #[serde(default)]
    pub attempt: u32,
}

impl TriggerEvent {
    pub fn created(key: &QueueKey) -> Self {
        Self {
            document: key.to_string(),
            attempt: 0,
        }
    }

    /// The same event, counted as one more attempt.
    pub fn retried(&self) -> Self {
        Self {
            document: self.document.clone(),
            attempt: self.attempt + 1,
        }
    }
}

/// Handle to the trigger list and its dead-letter list.
#[derive(Clone)]
pub struct TriggerQueue {
    redis: ConnectionManager,
    key: String,
    dead_letter_key: String,
}

impl TriggerQueue {
    pub fn new(redis: ConnectionManager, key: impl Into<String>) -> Self {
        let key = key.into();
        let dead_letter_key = format!("{}{}", key, DEAD_LETTER_SUFFIX);
        Self {
            redis,
            key,
            dead_letter_key,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dead_letter_key(&self) -> &str {
        &self.dead_letter_key
    }

    /// Announce a newly created record. Called by the game-state writer.
    pub async fn publish(&mut self, key: &QueueKey) -> Result<(), AppError> {
        self.push(&TriggerEvent::created(key)).await
    }

    /// Enqueue an event at the back of the list.
    pub async fn push(&mut self, event: &TriggerEvent) -> Result<(), AppError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| AppError::Internal(format!("failed to encode trigger event: {}", e)))?;
        self.redis.lpush::<_, _, ()>(&self.key, payload).await?;
        Ok(())
    }

    /// Wait up to `timeout_secs` for the next raw event payload.
    pub async fn next(&mut self, timeout_secs: u64) -> Result<Option<String>, AppError> {
        // BRPOP returns [list, value] or nil on timeout
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(timeout_secs)
            .query_async(&mut self.redis)
            .await?;

        Ok(popped.map(|(_, payload)| payload))
    }

    /// Park a payload that won't be retried.
    pub async fn dead_letter(&mut self, payload: &str) -> Result<(), AppError> {
        self.redis
            .lpush::<_, _, ()>(&self.dead_letter_key, payload)
            .await?;
        Ok(())
    }

    /// Number of parked payloads.
    pub async fn dead_letter_len(&mut self) -> Result<usize, AppError> {
        let len: usize = self.redis.llen(&self.dead_letter_key).await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_event() {
        let event = TriggerEvent::created(&QueueKey::new("g1", "n1"));
        assert_eq!(event.document, "games/g1/notificationQueue/n1");
        assert_eq!(event.attempt, 0);
        assert_eq!(event.retried().attempt, 1);
        assert_eq!(event.retried().document, event.document);
    }

    #[test]
    fn test_attempt_defaults_to_zero() {
        let event: TriggerEvent =
            serde_json::from_str(r#"{"document": "games/g/notificationQueue/n"}"#).unwrap();
        assert_eq!(event.attempt, 0);
    }
}
