//! Push message shapes exchanged with the messaging platform.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bingo_common::types::{NUMBER_CALLED, QueueKey, QueuedNotification};

/// Title shown on every "number called" push.
pub const NUMBER_CALLED_TITLE: &str = "New Bingo Number Called!";

/// Human-readable part of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

/// One message fanned out to many device tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastMessage {
    pub notification: PushNotification,
    /// Client-side routing data. FCM only accepts string values here.
    pub data: BTreeMap<String, String>,
    pub tokens: Vec<String>,
}

impl MulticastMessage {
    /// Build the push for a validated `numberCalled` record.
    ///
    /// The game id comes from the record's queue path, not its fields.
    pub fn number_called(record: &QueuedNotification, key: &QueueKey) -> Self {
        let number = record.number_text();

        let data = BTreeMap::from([
            ("type".to_string(), NUMBER_CALLED.to_string()),
            ("number".to_string(), number.clone()),
            ("gameId".to_string(), key.game_id.clone()),
        ]);

        Self {
            notification: PushNotification {
                title: NUMBER_CALLED_TITLE.to_string(),
                body: format!("Number {} has been called", number),
            },
            data,
            tokens: record.tokens().to_vec(),
        }
    }
}

/// Outcome of delivering to a single token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub success: bool,
    /// Platform-assigned message name on success.
    pub message_id: Option<String>,
    /// Failure detail on error.
    pub error: Option<String>,
}

impl SendResponse {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Per-token results of a multicast send, in token order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub responses: Vec<SendResponse>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchResponse {
    pub fn from_responses(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        let failure_count = responses.len() - success_count;
        Self {
            responses,
            success_count,
            failure_count,
        }
    }
}
