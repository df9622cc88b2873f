//! Persistence for queued notification records.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bingo_common::error::AppError;
use bingo_common::types::{QueueKey, QueuedNotification};

pub use memory::MemoryQueueStore;
pub use postgres::PgQueueStore;

/// Where queue records live and get retired.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Load a record, or `None` if nothing exists at `key`.
    async fn get(&self, key: &QueueKey) -> Result<Option<QueuedNotification>, AppError>;

    /// Append a record to its game's queue.
    async fn create(&self, key: &QueueKey, record: &QueuedNotification) -> Result<(), AppError>;

    /// Set `sent = true` and `sent_at` on an existing record.
    ///
    /// This is a plain write, not a compare-and-swap against `sent`.
    async fn mark_sent(&self, key: &QueueKey, sent_at: DateTime<Utc>) -> Result<(), AppError>;
}
