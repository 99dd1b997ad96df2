//! Role membership lookups used to expand role broadcasts

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::error::CollaboratorError;
use crate::error::LifecycleError;
use crate::identity::{ActorId, Identity, Role};

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Current members of `role`, computed at call time.
    async fn members(&self, role: Role) -> Result<Vec<ActorId>, CollaboratorError>;
}

/// Registered actors kept in memory, keyed by actor id.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    actors: RwLock<BTreeMap<ActorId, Identity>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Self-registration. Admin accounts cannot be created this way.
    pub async fn register(&self, identity: Identity) -> Result<(), LifecycleError> {
        if identity.role == Role::Admin {
            return Err(LifecycleError::forbidden(
                "admin accounts cannot be self-registered",
            ));
        }
        self.insert(identity).await
    }

    /// Bootstrap an admin account from configuration.
    pub async fn seed_admin(&self, actor_id: &str, display_name: &str) -> Result<(), LifecycleError> {
        self.insert(Identity::admin(actor_id, display_name)).await
    }

    async fn insert(&self, identity: Identity) -> Result<(), LifecycleError> {
        let mut actors = self.actors.write().await;
        if actors.contains_key(&identity.actor_id) {
            return Err(LifecycleError::conflict(format!(
                "actor {} is already registered",
                identity.actor_id
            )));
        }
        tracing::debug!(actor_id = %identity.actor_id, role = %identity.role, "Registered actor");
        actors.insert(identity.actor_id.clone(), identity);
        Ok(())
    }
}

#[async_trait]
impl RoleDirectory for MemoryDirectory {
    async fn members(&self, role: Role) -> Result<Vec<ActorId>, CollaboratorError> {
        Ok(self
            .actors
            .read()
            .await
            .values()
            .filter(|identity| identity.role == role)
            .map(|identity| identity.actor_id.clone())
            .collect())
    }
}
