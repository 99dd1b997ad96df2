use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::batch::BatchId;
use crate::identity::{ActorId, Role};

pub type NotificationId = String;

/// Who a dispatch is addressed to. Broadcasts resolve to the role's members at
/// dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "target")]
pub enum Recipient {
    Single(ActorId),
    RoleBroadcast(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Assignment,
    Lab,
    Bidding,
    Manufacturing,
    Ledger,
    System,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Assignment => "assignment",
            Category::Lab => "lab",
            Category::Bidding => "bidding",
            Category::Manufacturing => "manufacturing",
            Category::Ledger => "ledger",
            Category::System => "system",
        };
        f.write_str(name)
    }
}

/// One stored notification for one recipient. Only `read` ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub notification_id: NotificationId,
    pub recipient_id: ActorId,
    pub role: Role,
    pub title: String,
    pub message: String,
    pub batch_id: Option<BatchId>,
    pub category: Category,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification request before recipient resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dispatch {
    pub recipient: Recipient,
    pub role: Role,
    pub title: String,
    pub message: String,
    pub batch_id: Option<BatchId>,
    pub category: Category,
}

impl Dispatch {
    pub fn to_actor(
        actor_id: impl Into<ActorId>,
        role: Role,
        category: Category,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient: Recipient::Single(actor_id.into()),
            role,
            title: title.into(),
            message: message.into(),
            batch_id: None,
            category,
        }
    }

    pub fn to_role(
        role: Role,
        category: Category,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient: Recipient::RoleBroadcast(role),
            role,
            title: title.into(),
            message: message.into(),
            batch_id: None,
            category,
        }
    }

    pub fn for_batch(mut self, batch_id: impl Into<BatchId>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub(crate) fn record_for(&self, recipient_id: ActorId, created_at: DateTime<Utc>) -> NotificationRecord {
        NotificationRecord {
            notification_id: uuid::Uuid::new_v4().to_string(),
            recipient_id,
            role: self.role,
            title: self.title.clone(),
            message: self.message.clone(),
            batch_id: self.batch_id.clone(),
            category: self.category,
            read: false,
            created_at,
        }
    }
}
