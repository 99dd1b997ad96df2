// Caller identity - resolved upstream, trusted as-is by the lifecycle engine

use serde::{Deserialize, Serialize};
use std::fmt;

pub type ActorId = String;

/// The closed set of roles that take part in the custody chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Collector,
    Tester,
    Manufacturer,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Collector,
        Role::Tester,
        Role::Manufacturer,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Collector => "collector",
            Role::Tester => "tester",
            Role::Manufacturer => "manufacturer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{actorId, role, displayName}` as handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub actor_id: ActorId,
    pub role: Role,
    pub display_name: String,
}

impl Identity {
    pub fn new(actor_id: impl Into<String>, role: Role, display_name: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
            display_name: display_name.into(),
        }
    }

    pub fn collector(actor_id: &str, display_name: &str) -> Self {
        Self::new(actor_id, Role::Collector, display_name)
    }

    pub fn tester(actor_id: &str, display_name: &str) -> Self {
        Self::new(actor_id, Role::Tester, display_name)
    }

    pub fn manufacturer(actor_id: &str, display_name: &str) -> Self {
        Self::new(actor_id, Role::Manufacturer, display_name)
    }

    pub fn admin(actor_id: &str, display_name: &str) -> Self {
        Self::new(actor_id, Role::Admin, display_name)
    }

    pub fn actor_ref(&self) -> ActorRef {
        ActorRef {
            actor_id: self.actor_id.clone(),
            actor_name: self.display_name.clone(),
        }
    }
}

/// A lightweight `{id, name}` reference stored on batch records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorRef {
    pub actor_id: ActorId,
    pub actor_name: String,
}
