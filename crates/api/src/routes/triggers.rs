//! Document-created trigger endpoint.
//!
//! The event source posts the created record's path and field values. A
//! 2xx response acknowledges the event. Any other status asks the source to
//! re-deliver: 502 when the push call failed, 500 when the store failed, and
//! 404 when the push went out but the record to retire was never stored.
//! A re-delivered event is a no-op once the stored record is marked sent.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use bingo_common::error::AppError;
use bingo_common::types::{QueueKey, QueuedNotification};
use bingo_dispatcher::DispatchOutcome;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/triggers/notification-queue", post(notification_created))
}

/// Body of a document-created event.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentCreatedEvent {
    /// Path of the created document.
    pub document: String,
    /// Field values of the created document; absent when the event carried none.
    #[serde(default)]
    pub data: Option<QueuedNotification>,
}

/// POST /triggers/notification-queue — Dispatch a newly created queue record.
async fn notification_created(
    State(state): State<AppState>,
    Json(event): Json<DocumentCreatedEvent>,
) -> Result<Json<DispatchOutcome>, AppError> {
    let key = QueueKey::parse(&event.document).ok_or_else(|| {
        AppError::Validation(format!(
            "'{}' is not a games/{{gameId}}/notificationQueue/{{notificationId}} path",
            event.document
        ))
    })?;

    let outcome = state.dispatcher.dispatch(event.data.as_ref(), &key).await?;
    Ok(Json(outcome))
}
