use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::events::LifecycleEvent;
use super::store::NotificationStore;
use super::types::{Dispatch, NotificationRecord, Recipient};
use crate::error::LifecycleError;
use crate::external::RoleDirectory;

/// Fans dispatches out to individual recipients and serves the per-owner inbox.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn RoleDirectory>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, directory: Arc<dyn RoleDirectory>) -> Self {
        Self { store, directory }
    }

    /// Resolve the recipient and store one independent record per resolved actor.
    ///
    /// A broadcast to a role with no members stores nothing and succeeds.
    pub async fn dispatch(&self, dispatch: Dispatch) -> Result<Vec<NotificationRecord>, LifecycleError> {
        let recipients = match &dispatch.recipient {
            Recipient::Single(actor_id) => vec![actor_id.clone()],
            Recipient::RoleBroadcast(role) => self
                .directory
                .members(*role)
                .await
                .map_err(|e| LifecycleError::collaborator("role directory", e))?,
        };

        let now = Utc::now();
        let records: Vec<_> = recipients
            .into_iter()
            .map(|recipient_id| dispatch.record_for(recipient_id, now))
            .collect();

        if records.is_empty() {
            debug!(title = %dispatch.title, "Broadcast resolved to no recipients");
            return Ok(records);
        }

        self.store.insert_many(records.clone()).await?;
        info!(
            category = %dispatch.category,
            batch_id = ?dispatch.batch_id,
            recipients = records.len(),
            "Dispatched notification"
        );
        Ok(records)
    }

    pub async fn publish(&self, event: LifecycleEvent) -> Result<Vec<NotificationRecord>, LifecycleError> {
        self.dispatch(event.into_dispatch()).await
    }

    pub async fn list_notifications(
        &self,
        owner_id: &str,
        unread_only: bool,
    ) -> Result<Vec<NotificationRecord>, LifecycleError> {
        self.store.list_for(owner_id, unread_only).await
    }

    pub async fn unread_count(&self, owner_id: &str) -> Result<usize, LifecycleError> {
        Ok(self.store.list_for(owner_id, true).await?.len())
    }

    /// Idempotent; scoped to the owner of the notification.
    pub async fn mark_read(
        &self,
        owner_id: &str,
        notification_id: &str,
    ) -> Result<NotificationRecord, LifecycleError> {
        let record = self
            .store
            .get(notification_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound {
                entity: "notification",
                id: notification_id.to_string(),
            })?;

        if record.recipient_id != owner_id {
            return Err(LifecycleError::forbidden(format!(
                "notification {notification_id} belongs to another actor"
            )));
        }
        if record.read {
            return Ok(record);
        }
        self.store.mark_read(notification_id).await
    }

    pub async fn mark_all_read(&self, owner_id: &str) -> Result<usize, LifecycleError> {
        self.store.mark_all_read(owner_id).await
    }
}
