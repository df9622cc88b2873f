use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bingo_common::error::AppError;
use bingo_common::types::{QueueKey, QueuedNotification};

use super::QueueStore;

/// PostgreSQL-backed queue store over the `notification_queue` table.
#[derive(Debug, Clone)]
pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All records queued for a game, oldest first.
    pub async fn list_by_game(&self, game_id: &str) -> Result<Vec<QueuedNotification>, AppError> {
        let records: Vec<QueuedNotification> = sqlx::query_as(
            r#"
            SELECT type, number, fcm_tokens, sent, sent_at
            FROM notification_queue
            WHERE game_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn get(&self, key: &QueueKey) -> Result<Option<QueuedNotification>, AppError> {
        let record: Option<QueuedNotification> = sqlx::query_as(
            r#"
            SELECT type, number, fcm_tokens, sent, sent_at
            FROM notification_queue
            WHERE game_id = $1 AND id = $2
            "#,
        )
        .bind(&key.game_id)
        .bind(&key.notification_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn create(&self, key: &QueueKey, record: &QueuedNotification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notification_queue (game_id, id, type, number, fcm_tokens, sent, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&key.game_id)
        .bind(&key.notification_id)
        .bind(&record.kind)
        .bind(&record.number)
        .bind(&record.fcm_tokens)
        .bind(record.sent)
        .bind(record.sent_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(document = %key, "Queue record created");
        Ok(())
    }

    async fn mark_sent(&self, key: &QueueKey, sent_at: DateTime<Utc>) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE notification_queue SET sent = true, sent_at = $3 WHERE game_id = $1 AND id = $2",
        )
        .bind(&key.game_id)
        .bind(&key.notification_id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} not found", key)));
        }
        Ok(())
    }
}
