//! Evidence storage (photos, lab reports, certificates)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::error::CollaboratorError;
use super::ContentId;

const SERVICE: &str = "blob store";

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return the content id they can later be resolved by.
    async fn upload(&self, bytes: &[u8], name: &str) -> Result<ContentId, CollaboratorError>;
}

/// Keeps uploads in process memory. Can be switched offline to exercise failure paths.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<ContentId, (String, Vec<u8>)>>,
    offline: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    pub fn get(&self, content_id: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(content_id).map(|(_, bytes)| bytes.clone()))
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bytes: &[u8], name: &str) -> Result<ContentId, CollaboratorError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable(SERVICE, "store is offline"));
        }
        if bytes.is_empty() {
            return Err(CollaboratorError::rejected(
                SERVICE,
                format!("refusing empty upload '{name}'"),
            ));
        }
        let content_id = format!("bafy{}", uuid::Uuid::new_v4().simple());
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| CollaboratorError::unavailable(SERVICE, "object table poisoned"))?;
        objects.insert(content_id.clone(), (name.to_string(), bytes.to_vec()));
        tracing::debug!(content_id = %content_id, name = %name, size = bytes.len(), "Stored evidence");
        Ok(content_id)
    }
}
