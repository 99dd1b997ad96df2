use async_trait::async_trait;

use crate::batch::{BatchRecord, BatchStatus};
use crate::error::LifecycleError;

/// A mutation applied to a copy of the stored record inside the store's critical
/// section. Returning an error aborts the write and leaves the record unchanged.
pub type Mutation<'a> = &'a (dyn Fn(&mut BatchRecord) -> Result<(), LifecycleError> + Send + Sync);

/// Result of a conditional (compare-and-set) update.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalWrite {
    /// The stored status matched and the mutation was committed.
    Applied(BatchRecord),
    /// The stored status no longer matched; nothing was written.
    StatusMismatch { actual: BatchStatus },
}

/// Persistence for batch records.
///
/// ## Atomicity
///
/// `update` and `update_if` run the mutation against the latest stored copy and
/// commit it atomically with respect to every other writer of the same record.
/// `update_if` additionally checks the stored status against `expected` inside the
/// same critical section; this is the primitive behind every single-winner
/// transition. Callers must never emulate it with `get` followed by `update`.
///
/// Both bump `BatchRecord::version` on success.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Insert a new record. `Conflict` when the id is taken.
    async fn insert(&self, record: BatchRecord) -> Result<BatchRecord, LifecycleError>;

    /// `NotFound` when no record has this id.
    async fn get(&self, batch_id: &str) -> Result<BatchRecord, LifecycleError>;

    /// Look a record up by packaging unit id or label id.
    async fn find_by_unit_id(&self, unit_id: &str) -> Result<Option<BatchRecord>, LifecycleError>;

    /// All records, oldest first, optionally filtered by status.
    async fn list(&self, status: Option<BatchStatus>) -> Result<Vec<BatchRecord>, LifecycleError>;

    /// Apply `mutation` whatever the current status.
    async fn update(
        &self,
        batch_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<BatchRecord, LifecycleError>;

    /// Apply `mutation` only if the stored status is still `expected`.
    async fn update_if(
        &self,
        batch_id: &str,
        expected: BatchStatus,
        mutation: Mutation<'_>,
    ) -> Result<ConditionalWrite, LifecycleError>;
}
