use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bingo_common::error::AppError;
use bingo_common::types::{QueueKey, QueuedNotification};

use super::QueueStore;

type Records = HashMap<QueueKey, QueuedNotification>;

/// In-process queue store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    records: Mutex<Records>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>, AppError> {
        self.records
            .lock()
            .map_err(|_| AppError::Internal("queue store lock poisoned".to_string()))
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn get(&self, key: &QueueKey) -> Result<Option<QueuedNotification>, AppError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn create(&self, key: &QueueKey, record: &QueuedNotification) -> Result<(), AppError> {
        let mut records = self.lock()?;
        if records.contains_key(key) {
            return Err(AppError::Validation(format!("{} already exists", key)));
        }
        records.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn mark_sent(&self, key: &QueueKey, sent_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(key)
            .ok_or_else(|| AppError::NotFound(format!("{} not found", key)))?;
        record.sent = true;
        record.sent_at = Some(sent_at);
        Ok(())
    }
}
