use serde::Serialize;

use crate::batch::{AnchorKind, BatchRecord};
use crate::error::{ErrorKind, LifecycleError};

/// A post-commit step that failed. The transition itself stays committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "step", content = "kind")]
pub enum FollowUpStep {
    Anchor(AnchorKind),
    Notification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpFailure {
    pub step: FollowUpStep,
    pub error_kind: ErrorKind,
    pub reason: String,
    pub retryable: bool,
}

impl FollowUpFailure {
    pub fn new(step: FollowUpStep, error: &LifecycleError) -> Self {
        Self {
            step,
            error_kind: error.kind(),
            reason: error.to_string(),
            retryable: error.kind().is_retryable(),
        }
    }
}

/// What a successful transition returns: the committed record plus any
/// post-commit steps that need attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionReport {
    pub record: BatchRecord,
    pub follow_ups: Vec<FollowUpFailure>,
}

impl TransitionReport {
    pub fn new(record: BatchRecord) -> Self {
        Self {
            record,
            follow_ups: Vec::new(),
        }
    }

    pub fn with_follow_ups(record: BatchRecord, follow_ups: Vec<FollowUpFailure>) -> Self {
        Self { record, follow_ups }
    }

    pub fn is_clean(&self) -> bool {
        self.follow_ups.is_empty()
    }

    pub fn into_record(self) -> BatchRecord {
        self.record
    }
}
