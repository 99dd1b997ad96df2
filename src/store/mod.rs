//! Batch persistence
//!
//! `BatchStore` is the single write path for batch records. The in-memory backend is
//! always available; the SQLite backend is compiled in with the `database` feature.

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;
pub mod traits;

pub use memory::MemoryBatchStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteBatchStore;
pub use traits::{BatchStore, ConditionalWrite, Mutation};

use std::sync::Arc;

use crate::config::HerbTraceConfig;
use crate::error::LifecycleError;

/// Open the store selected by configuration.
///
/// A `[database]` section selects SQLite when the `database` feature is enabled;
/// otherwise records are kept in memory.
pub async fn open_store(config: &HerbTraceConfig) -> Result<Arc<dyn BatchStore>, LifecycleError> {
    #[cfg(feature = "database")]
    {
        if let Some(db) = &config.database {
            let store = SqliteBatchStore::connect(&db.url, db.max_connections, db.auto_migrate)
                .await?
                .with_max_attempts(db.max_write_attempts);
            tracing::info!(url = %db.url, "Using SQLite batch store");
            return Ok(Arc::new(store));
        }
    }

    #[cfg(not(feature = "database"))]
    {
        if config.database.is_some() {
            tracing::warn!(
                "Database configured but the database feature is disabled, using memory store"
            );
        }
    }

    Ok(Arc::new(MemoryBatchStore::new()))
}
