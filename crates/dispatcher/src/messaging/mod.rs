//! Outbound multicast push delivery.

pub mod auth;
pub mod fcm;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{BatchResponse, MulticastMessage};

pub use auth::{ServiceAccountKey, TokenSource};
pub use fcm::FcmClient;

/// Maximum number of tokens FCM accepts in one multicast call.
pub const MAX_MULTICAST_TOKENS: usize = 500;

/// Whole-call failures. Per-token failures are reported in
/// [`BatchResponse`] instead and never surface here.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// A messaging platform able to send one message to many device tokens.
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Send `message` to every token, reporting each token's outcome.
    ///
    /// Returns `Err` only when the call as a whole fails (bad message,
    /// authentication, transport to the auth server).
    async fn send_each_for_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<BatchResponse, MessagingError>;
}

/// Reject messages the platform would refuse outright.
pub fn validate_multicast(message: &MulticastMessage) -> Result<(), MessagingError> {
    if message.tokens.is_empty() {
        return Err(MessagingError::InvalidMessage(
            "tokens must be a non-empty list".to_string(),
        ));
    }
    if message.tokens.len() > MAX_MULTICAST_TOKENS {
        return Err(MessagingError::InvalidMessage(format!(
            "tokens must not contain more than {} items, got {}",
            MAX_MULTICAST_TOKENS,
            message.tokens.len()
        )));
    }
    if message.tokens.iter().any(|t| t.is_empty()) {
        return Err(MessagingError::InvalidMessage(
            "tokens must be non-empty strings".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::message::PushNotification;

    fn message_with(tokens: Vec<String>) -> MulticastMessage {
        MulticastMessage {
            notification: PushNotification {
                title: "t".to_string(),
                body: "b".to_string(),
            },
            data: BTreeMap::new(),
            tokens,
        }
    }

    #[test]
    fn test_validate_multicast_limits() {
        assert!(validate_multicast(&message_with(vec!["a".to_string()])).is_ok());
        assert!(validate_multicast(&message_with(vec![])).is_err());
        assert!(validate_multicast(&message_with(vec![String::new()])).is_err());

        let too_many = (0..=MAX_MULTICAST_TOKENS).map(|i| format!("t{}", i)).collect();
        let err = validate_multicast(&message_with(too_many)).unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
