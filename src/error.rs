// Error taxonomy for lifecycle operations
//
// Every failure carries its kind plus a human-readable reason. Nothing is folded
// into a generic failure.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::external::CollaboratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Forbidden,
    NotFound,
    InvalidState,
    Conflict,
    CollaboratorFailure,
    InvalidInput,
    Storage,
}

impl ErrorKind {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::CollaboratorFailure | ErrorKind::Storage)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Conflict => "conflict",
            ErrorKind::CollaboratorFailure => "collaborator_failure",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Wrong role, or not the actor assigned to this record.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The current status (or a missing precondition) does not allow the operation.
    #[error("{operation} not allowed: {reason}")]
    InvalidState {
        operation: &'static str,
        reason: String,
    },

    /// Lost a claim race or submitted a duplicate.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// An external dependency failed. The record was not mutated.
    #[error("{collaborator} failed: {source}")]
    CollaboratorFailure {
        collaborator: &'static str,
        #[source]
        source: CollaboratorError,
    },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The ledger accepted an anchor but the record could not take it. Carries the
    /// transaction id so the caller can reconcile; `kind()` is that of `source`.
    #[error("ledger transaction {transaction_id} was written but not recorded: {source}")]
    UnrecordedAnchor {
        transaction_id: String,
        #[source]
        source: Box<LifecycleError>,
    },
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Forbidden { .. } => ErrorKind::Forbidden,
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::InvalidState { .. } => ErrorKind::InvalidState,
            LifecycleError::Conflict { .. } => ErrorKind::Conflict,
            LifecycleError::CollaboratorFailure { .. } => ErrorKind::CollaboratorFailure,
            LifecycleError::InvalidInput { .. } => ErrorKind::InvalidInput,
            LifecycleError::Storage(_) => ErrorKind::Storage,
            LifecycleError::UnrecordedAnchor { source, .. } => source.kind(),
        }
    }

    pub fn batch_not_found(batch_id: &str) -> Self {
        LifecycleError::NotFound {
            entity: "batch",
            id: batch_id.to_string(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        LifecycleError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(operation: &'static str, reason: impl Into<String>) -> Self {
        LifecycleError::InvalidState {
            operation,
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        LifecycleError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        LifecycleError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn collaborator(collaborator: &'static str, source: CollaboratorError) -> Self {
        LifecycleError::CollaboratorFailure {
            collaborator,
            source,
        }
    }
}

/// Backend failures raised by a `BatchStore` or `NotificationStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("write contention on {id}: gave up after {attempts} attempts")]
    Contention { id: String, attempts: u32 },

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for LifecycleError {
    fn from(err: sqlx::Error) -> Self {
        LifecycleError::Storage(StoreError::from(err))
    }
}
