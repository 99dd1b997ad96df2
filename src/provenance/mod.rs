//! Public provenance
//!
//! Unauthenticated, read-only reconstruction of a batch's history for whoever
//! scans the product label.

pub mod gateway;
pub mod projector;
pub mod types;

pub use gateway::ContentGateway;
pub use projector::ProvenanceProjector;
pub use types::{MediaItem, ProvenanceStage, PublicProvenance, StageKind, VerificationState};
