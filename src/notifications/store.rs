use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{NotificationId, NotificationRecord};
use crate::error::LifecycleError;

/// Persistence for notification records. Records are never deleted.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_many(&self, records: Vec<NotificationRecord>) -> Result<(), LifecycleError>;

    async fn get(&self, notification_id: &str) -> Result<Option<NotificationRecord>, LifecycleError>;

    /// Newest first.
    async fn list_for(
        &self,
        owner_id: &str,
        unread_only: bool,
    ) -> Result<Vec<NotificationRecord>, LifecycleError>;

    /// Flip `read` to true. No-op when already read.
    async fn mark_read(&self, notification_id: &str) -> Result<NotificationRecord, LifecycleError>;

    /// Returns how many records changed.
    async fn mark_all_read(&self, owner_id: &str) -> Result<usize, LifecycleError>;
}

#[derive(Debug, Default)]
pub struct MemoryNotificationStore {
    // insertion order kept alongside the index for stable listing
    records: RwLock<(Vec<NotificationId>, HashMap<NotificationId, NotificationRecord>)>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(notification_id: &str) -> LifecycleError {
    LifecycleError::NotFound {
        entity: "notification",
        id: notification_id.to_string(),
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert_many(&self, records: Vec<NotificationRecord>) -> Result<(), LifecycleError> {
        let mut guard = self.records.write().await;
        let (order, index) = &mut *guard;
        for record in records {
            order.push(record.notification_id.clone());
            index.insert(record.notification_id.clone(), record);
        }
        Ok(())
    }

    async fn get(&self, notification_id: &str) -> Result<Option<NotificationRecord>, LifecycleError> {
        Ok(self.records.read().await.1.get(notification_id).cloned())
    }

    async fn list_for(
        &self,
        owner_id: &str,
        unread_only: bool,
    ) -> Result<Vec<NotificationRecord>, LifecycleError> {
        let guard = self.records.read().await;
        let (order, index) = &*guard;
        Ok(order
            .iter()
            .rev()
            .filter_map(|id| index.get(id))
            .filter(|record| record.recipient_id == owner_id)
            .filter(|record| !unread_only || !record.read)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, notification_id: &str) -> Result<NotificationRecord, LifecycleError> {
        let mut guard = self.records.write().await;
        let record = guard
            .1
            .get_mut(notification_id)
            .ok_or_else(|| not_found(notification_id))?;
        record.read = true;
        Ok(record.clone())
    }

    async fn mark_all_read(&self, owner_id: &str) -> Result<usize, LifecycleError> {
        let mut guard = self.records.write().await;
        let mut changed = 0;
        for record in guard.1.values_mut() {
            if record.recipient_id == owner_id && !record.read {
                record.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
