//! Anchoring ledger: records batch milestones and verifies public unit ids

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::error::CollaboratorError;
use super::TransactionId;
use crate::batch::{AnchorKind, BatchRecord};

const SERVICE: &str = "ledger";

/// What gets written to the ledger for one milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPayload {
    pub kind: AnchorKind,
    pub batch_id: String,
    /// Unit id once the batch has one, otherwise the batch id.
    pub public_id: String,
    pub herb_name: String,
    pub status: String,
    pub lab_passed: Option<bool>,
    pub anchored_at: DateTime<Utc>,
}

impl AnchorPayload {
    pub fn for_record(kind: AnchorKind, record: &BatchRecord) -> Self {
        Self {
            kind,
            batch_id: record.batch_id.clone(),
            public_id: record
                .unit_id()
                .map(str::to_string)
                .unwrap_or_else(|| record.batch_id.clone()),
            herb_name: record.herb_name.clone(),
            status: record.status.to_string(),
            lab_passed: record.lab_result.as_ref().map(|r| r.passed),
            anchored_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerVerification {
    pub verified: bool,
    pub transaction_id: Option<TransactionId>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn anchor(&self, payload: &AnchorPayload) -> Result<TransactionId, CollaboratorError>;

    async fn verify(&self, unit_id: &str) -> Result<LedgerVerification, CollaboratorError>;
}

/// In-process ledger. Packaging and final anchors count as public verification.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<String, Vec<(AnchorKind, TransactionId)>>>,
    offline: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    pub fn anchors_for(&self, public_id: &str) -> Vec<(AnchorKind, TransactionId)> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(public_id).cloned())
            .unwrap_or_default()
    }

    fn ensure_online(&self) -> Result<(), CollaboratorError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable(SERVICE, "ledger node unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn anchor(&self, payload: &AnchorPayload) -> Result<TransactionId, CollaboratorError> {
        self.ensure_online()?;
        let transaction_id = format!("0x{}", uuid::Uuid::new_v4().simple());
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CollaboratorError::unavailable(SERVICE, "ledger state poisoned"))?;
        entries
            .entry(payload.public_id.clone())
            .or_default()
            .push((payload.kind, transaction_id.clone()));
        tracing::info!(
            batch_id = %payload.batch_id,
            public_id = %payload.public_id,
            kind = %payload.kind,
            transaction_id = %transaction_id,
            "Anchored batch milestone"
        );
        Ok(transaction_id)
    }

    async fn verify(&self, unit_id: &str) -> Result<LedgerVerification, CollaboratorError> {
        self.ensure_online()?;
        let transaction_id = self
            .anchors_for(unit_id)
            .into_iter()
            .rev()
            .find(|(kind, _)| matches!(kind, AnchorKind::Packaging | AnchorKind::Final))
            .map(|(_, tx)| tx);
        Ok(LedgerVerification {
            verified: transaction_id.is_some(),
            transaction_id,
        })
    }
}
