// Wiring for a complete in-process HerbTrace instance

use std::sync::Arc;

use crate::config::HerbTraceConfig;
use crate::error::LifecycleError;
use crate::external::{
    Collaborators, CoordinateGeocoder, MemoryBlobStore, MemoryDirectory, MemoryLedger,
    StaticClassifier,
};
use crate::lifecycle::BatchLifecycle;
use crate::notifications::{MemoryNotificationStore, NotificationDispatcher};
use crate::provenance::{ContentGateway, ProvenanceProjector};
use crate::store::{self, BatchStore};

/// Lifecycle engine, projector and the in-process collaborators behind them.
pub struct HerbTrace {
    pub lifecycle: BatchLifecycle,
    pub projector: ProvenanceProjector,
    pub directory: Arc<MemoryDirectory>,
    pub blobs: Arc<MemoryBlobStore>,
    pub ledger: Arc<MemoryLedger>,
}

impl HerbTrace {
    /// Build on top of an already opened batch store. The classifier answers
    /// `species_label` for every photo.
    pub async fn with_store(
        config: &HerbTraceConfig,
        store: Arc<dyn BatchStore>,
        species_label: &str,
    ) -> Result<Self, LifecycleError> {
        let directory = Arc::new(MemoryDirectory::new());
        directory
            .seed_admin(&config.admin.actor_id, &config.admin.display_name)
            .await?;

        let blobs = Arc::new(MemoryBlobStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let collaborators = Collaborators {
            blobs: blobs.clone(),
            classifier: Arc::new(StaticClassifier::new(species_label)),
            ledger: ledger.clone(),
            geocoder: Arc::new(CoordinateGeocoder),
        };

        let notifications = NotificationDispatcher::new(
            Arc::new(MemoryNotificationStore::new()),
            directory.clone(),
        );
        let lifecycle = BatchLifecycle::new(
            store.clone(),
            collaborators,
            notifications,
            config.labels.clone(),
        );
        let projector = ProvenanceProjector::new(
            store,
            ledger.clone(),
            ContentGateway::from_config(&config.gateway),
        );

        Ok(Self {
            lifecycle,
            projector,
            directory,
            blobs,
            ledger,
        })
    }

    /// Open the configured store and build on top of it.
    pub async fn from_config(config: &HerbTraceConfig, species_label: &str) -> Result<Self, LifecycleError> {
        let store = store::open_store(config).await?;
        Self::with_store(config, store, species_label).await
    }
}
