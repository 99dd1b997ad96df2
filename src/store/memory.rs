//! In-memory batch store.
//!
//! Records live behind their own mutex so writers to different batches never wait on
//! each other; the outer map lock is only held long enough to find or insert a slot.
//! Unit and label ids are claimed in a separate index while the writer still holds
//! its record, so two batches can never commit the same public id.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::traits::{BatchStore, ConditionalWrite, Mutation};
use crate::batch::{BatchId, BatchRecord, BatchStatus};
use crate::error::LifecycleError;

type Slots = HashMap<BatchId, Arc<Mutex<BatchRecord>>>;

#[derive(Debug, Default)]
pub struct MemoryBatchStore {
    records: RwLock<Slots>,
    /// Unit and label ids, mapped to the batch holding them.
    public_ids: Mutex<HashMap<String, BatchId>>,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, batch_id: &str) -> Result<Arc<Mutex<BatchRecord>>, LifecycleError> {
        self.records
            .read()
            .await
            .get(batch_id)
            .cloned()
            .ok_or_else(|| LifecycleError::batch_not_found(batch_id))
    }

    async fn snapshot(&self) -> Vec<BatchRecord> {
        let slots: Vec<_> = self.records.read().await.values().cloned().collect();
        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            records.push(slot.lock().await.clone());
        }
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.batch_id.cmp(&b.batch_id))
        });
        records
    }
}

fn public_ids(record: &BatchRecord) -> Vec<String> {
    let mut ids: Vec<String> = record
        .packaging_record
        .iter()
        .map(|p| p.unit_id.clone())
        .chain(record.manufacturer_assignment.iter().map(|m| m.label_id.clone()))
        .collect();
    ids.dedup();
    ids
}

/// `Conflict` when `id` already names another batch, as a public id or a batch id.
fn ensure_unclaimed(
    records: &Slots,
    index: &HashMap<String, BatchId>,
    batch_id: &str,
    id: &str,
) -> Result<(), LifecycleError> {
    if let Some(owner) = index.get(id).filter(|owner| owner.as_str() != batch_id) {
        return Err(LifecycleError::conflict(format!(
            "unit id {id} is already used by batch {owner}"
        )));
    }
    if id != batch_id && records.contains_key(id) {
        return Err(LifecycleError::conflict(format!(
            "unit id {id} is the id of another batch"
        )));
    }
    Ok(())
}

impl MemoryBatchStore {
    async fn apply(
        &self,
        stored: &mut BatchRecord,
        mutation: Mutation<'_>,
    ) -> Result<BatchRecord, LifecycleError> {
        let mut next = stored.clone();
        mutation(&mut next)?;
        next.version = stored.version + 1;

        let held = public_ids(stored);
        let claimed: Vec<String> = public_ids(&next)
            .into_iter()
            .filter(|id| !held.contains(id))
            .collect();
        if !claimed.is_empty() {
            let records = self.records.read().await;
            let mut index = self.public_ids.lock().await;
            for id in &claimed {
                ensure_unclaimed(&records, &index, &next.batch_id, id)?;
            }
            for id in claimed {
                index.insert(id, next.batch_id.clone());
            }
        }

        *stored = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl BatchStore for MemoryBatchStore {
    async fn insert(&self, record: BatchRecord) -> Result<BatchRecord, LifecycleError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.batch_id) {
            return Err(LifecycleError::conflict(format!(
                "batch {} already exists",
                record.batch_id
            )));
        }

        let mut index = self.public_ids.lock().await;
        if let Some(owner) = index.get(&record.batch_id) {
            return Err(LifecycleError::conflict(format!(
                "batch id {} is already a unit id of batch {owner}",
                record.batch_id
            )));
        }
        let ids = public_ids(&record);
        for id in &ids {
            ensure_unclaimed(&records, &index, &record.batch_id, id)?;
        }
        for id in ids {
            index.insert(id, record.batch_id.clone());
        }

        records.insert(
            record.batch_id.clone(),
            Arc::new(Mutex::new(record.clone())),
        );
        Ok(record)
    }

    async fn get(&self, batch_id: &str) -> Result<BatchRecord, LifecycleError> {
        let slot = self.slot(batch_id).await?;
        let record = slot.lock().await.clone();
        Ok(record)
    }

    async fn find_by_unit_id(&self, unit_id: &str) -> Result<Option<BatchRecord>, LifecycleError> {
        Ok(self.snapshot().await.into_iter().find(|record| {
            record
                .packaging_record
                .as_ref()
                .is_some_and(|p| p.unit_id == unit_id)
                || record
                    .manufacturer_assignment
                    .as_ref()
                    .is_some_and(|m| m.label_id == unit_id)
        }))
    }

    async fn list(&self, status: Option<BatchStatus>) -> Result<Vec<BatchRecord>, LifecycleError> {
        let mut records = self.snapshot().await;
        if let Some(status) = status {
            records.retain(|record| record.status == status);
        }
        Ok(records)
    }

    async fn update(
        &self,
        batch_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<BatchRecord, LifecycleError> {
        let slot = self.slot(batch_id).await?;
        let mut stored = slot.lock().await;
        self.apply(&mut stored, mutation).await
    }

    async fn update_if(
        &self,
        batch_id: &str,
        expected: BatchStatus,
        mutation: Mutation<'_>,
    ) -> Result<ConditionalWrite, LifecycleError> {
        let slot = self.slot(batch_id).await?;
        let mut stored = slot.lock().await;
        if stored.status != expected {
            return Ok(ConditionalWrite::StatusMismatch {
                actual: stored.status,
            });
        }
        self.apply(&mut stored, mutation)
            .await
            .map(ConditionalWrite::Applied)
    }
}
