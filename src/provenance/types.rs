use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::batch::BatchStatus;
use crate::external::{ContentId, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    /// The ledger confirms the public id.
    ChainVerified,
    /// The ledger answered but has no anchor for the public id.
    AnchorMissing,
    /// The ledger could not be reached.
    Unverified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Cultivation,
    LabTesting,
    Manufacturing,
    Packaging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub title: String,
    pub content_id: ContentId,
    pub url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceStage {
    pub position: usize,
    pub kind: StageKind,
    pub name: String,
    pub recorded_at: DateTime<Utc>,
    pub location: String,
    pub description: String,
    pub media: Vec<MediaItem>,
}

/// Consumer-facing view of a batch, safe to show unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicProvenance {
    pub public_id: String,
    pub batch_id: String,
    pub product_name: String,
    pub status: BatchStatus,
    pub farmer_name: String,
    pub farm_location: String,
    pub verification: VerificationState,
    pub transaction_id: Option<TransactionId>,
    pub quality_grade: Option<String>,
    pub stages: Vec<ProvenanceStage>,
}
