// Batch record model: status enumeration, record shape and command payloads

pub mod commands;
pub mod record;
pub mod status;

pub use commands::{
    AssignCollector, Evidence, FinalAnchorRequest, GrowthProof, LabReport, ManufacturerSelection,
    ManufacturingSubmission, NewBatch, PackagingSubmission, QuoteSubmission,
};
pub use record::{
    new_batch_id, AnchorKind, BatchId, BatchRecord, CollectorAssignment, GeoPoint, GrowthRecord,
    LabAssignment, LabResult, LedgerReference, ManufacturerAssignment, ManufacturingRecord,
    PackagingRecord, Quote, FAILING_QUALITY_SCORE, PASSING_QUALITY_SCORE,
};
pub use status::{BatchStatus, GrowthStage, MAX_GROWTH_STAGE};
