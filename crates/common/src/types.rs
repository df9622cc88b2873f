use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only queue record type the dispatcher acts on.
pub const NUMBER_CALLED: &str = "numberCalled";

/// Collection segment under a game document that holds queued notifications.
const QUEUE_COLLECTION: &str = "notificationQueue";

/// Top-level collection holding game documents.
const GAMES_COLLECTION: &str = "games";

/// A record appended to a game's notification queue by the game-state writer.
///
/// Field names serialize in the camelCase shape the mobile client and the
/// game-state writer use (`fcmTokens`, `sentAt`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QueuedNotification {
    /// Record type tag; only `"numberCalled"` is dispatched.
    #[serde(rename = "type", default)]
    #[sqlx(rename = "type")]
    pub kind: Option<String>,
    /// The called number, passed through to the push payload untouched.
    #[serde(default)]
    pub number: serde_json::Value,
    /// Device tokens that receive the push.
    #[serde(default)]
    pub fcm_tokens: Option<Vec<String>>,
    #[serde(default)]
    pub sent: bool,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl QueuedNotification {
    /// Build an unsent `numberCalled` record.
    pub fn number_called(number: impl Into<serde_json::Value>, fcm_tokens: Vec<String>) -> Self {
        Self {
            kind: Some(NUMBER_CALLED.to_string()),
            number: number.into(),
            fcm_tokens: Some(fcm_tokens),
            sent: false,
            sent_at: None,
        }
    }

    /// Tokens to deliver to, treating an absent list as empty.
    pub fn tokens(&self) -> &[String] {
        self.fcm_tokens.as_deref().unwrap_or_default()
    }

    /// Why this record can't be dispatched, or `None` if it can.
    pub fn invalid_reason(&self) -> Option<String> {
        match self.kind.as_deref() {
            Some(NUMBER_CALLED) => {}
            Some(other) => return Some(format!("unsupported notification type '{}'", other)),
            None => return Some("missing notification type".to_string()),
        }
        if self.tokens().is_empty() {
            return Some("no FCM tokens".to_string());
        }
        None
    }

    /// Render the called number as a plain string.
    ///
    /// JSON strings are used verbatim so `"B12"` doesn't pick up quotes;
    /// anything else renders as compact JSON (`42`, `true`, `null`).
    pub fn number_text(&self) -> String {
        match &self.number {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Location of a queue record: `games/{game_id}/notificationQueue/{notification_id}`.
///
/// The game id is only ever taken from here, never from the record body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    pub game_id: String,
    pub notification_id: String,
}

impl QueueKey {
    pub fn new(game_id: impl Into<String>, notification_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            notification_id: notification_id.into(),
        }
    }

    /// Allocate a fresh notification id under a game's queue.
    pub fn generate(game_id: impl Into<String>) -> Self {
        Self::new(game_id, Uuid::new_v4().to_string())
    }

    /// Parse a document path. Returns `None` for anything that isn't exactly
    /// `games/{id}/notificationQueue/{id}` with non-empty ids.
    pub fn parse(path: &str) -> Option<Self> {
        let mut segments = path.trim_matches('/').split('/');
        let (games, game_id, queue, notification_id) = (
            segments.next()?,
            segments.next()?,
            segments.next()?,
            segments.next()?,
        );
        if segments.next().is_some()
            || games != GAMES_COLLECTION
            || queue != QUEUE_COLLECTION
            || game_id.is_empty()
            || notification_id.is_empty()
        {
            return None;
        }
        Some(Self::new(game_id, notification_id))
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            GAMES_COLLECTION, self.game_id, QUEUE_COLLECTION, self.notification_id
        )
    }
}
