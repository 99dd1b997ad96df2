// HerbTrace Library - herb batch custody chain
// This exposes the lifecycle engine and its collaborators for the CLI and tests

pub mod app;
pub mod batch;
pub mod config;
pub mod error;
pub mod external;
pub mod identity;
pub mod lifecycle;
pub mod notifications;
pub mod observability;
pub mod provenance;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use app::HerbTrace;
pub use batch::{BatchId, BatchRecord, BatchStatus, GrowthStage};
pub use config::{config, init_config, HerbTraceConfig};
pub use error::{ErrorKind, LifecycleError, StoreError};
pub use external::{Collaborators, CollaboratorError};
pub use identity::{ActorId, Identity, Role};
pub use lifecycle::{BatchLifecycle, FollowUpFailure, FollowUpStep, Operation, TransitionReport};
pub use notifications::{
    Category, Dispatch, LifecycleEvent, NotificationDispatcher, NotificationRecord, Recipient,
};
pub use observability::{LifecycleMetrics, OperationTimer};
pub use provenance::{ProvenanceProjector, PublicProvenance, VerificationState};
pub use store::{BatchStore, ConditionalWrite, MemoryBatchStore};
pub use telemetry::{create_lifecycle_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
