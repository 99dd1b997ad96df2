//! Notification fan-out and inbox
//!
//! Transitions publish a `LifecycleEvent` after they commit. The dispatcher turns
//! it into a `Dispatch`, resolves role broadcasts through the `RoleDirectory`
//! and stores one record per recipient.

pub mod dispatcher;
pub mod events;
pub mod store;
pub mod types;

pub use dispatcher::NotificationDispatcher;
pub use events::LifecycleEvent;
pub use store::{MemoryNotificationStore, NotificationStore};
pub use types::{Category, Dispatch, NotificationId, NotificationRecord, Recipient};
