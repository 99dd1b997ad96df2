//! External collaborator abstractions
//!
//! Trait-based seams for everything the lifecycle engine consumes but does not own:
//! evidence storage, species classification, the anchoring ledger, reverse geocoding
//! and the role directory used to resolve broadcasts. Each trait ships with an
//! in-process implementation used by the CLI and the integration tests.

pub mod blob;
pub mod classifier;
pub mod directory;
pub mod error;
pub mod geocoder;
pub mod ledger;

pub use blob::{BlobStore, MemoryBlobStore};
pub use classifier::{SpeciesClassifier, StaticClassifier};
pub use directory::{MemoryDirectory, RoleDirectory};
pub use error::CollaboratorError;
pub use geocoder::{CoordinateGeocoder, ReverseGeocoder};
pub use ledger::{AnchorPayload, Ledger, LedgerVerification, MemoryLedger};

#[cfg(any(test, feature = "testing"))]
pub use blob::MockBlobStore;
#[cfg(any(test, feature = "testing"))]
pub use classifier::MockSpeciesClassifier;
#[cfg(any(test, feature = "testing"))]
pub use directory::MockRoleDirectory;
#[cfg(any(test, feature = "testing"))]
pub use geocoder::MockReverseGeocoder;
#[cfg(any(test, feature = "testing"))]
pub use ledger::MockLedger;

use std::sync::Arc;

pub type ContentId = String;
pub type TransactionId = String;

/// The set of collaborators a `BatchLifecycle` calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub blobs: Arc<dyn BlobStore>,
    pub classifier: Arc<dyn SpeciesClassifier>,
    pub ledger: Arc<dyn Ledger>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
}

impl Collaborators {
    /// In-process collaborators; the classifier always answers `species_label`.
    pub fn in_memory(species_label: &str) -> Self {
        Self {
            blobs: Arc::new(MemoryBlobStore::new()),
            classifier: Arc::new(StaticClassifier::new(species_label)),
            ledger: Arc::new(MemoryLedger::new()),
            geocoder: Arc::new(CoordinateGeocoder),
        }
    }
}
