//! Batch lifecycle engine
//!
//! `BatchLifecycle` exposes one async method per transition. Each one follows the
//! same shape:
//!
//! 1. role check against the caller identity
//! 2. guard check on a snapshot, then collaborator calls (upload, classify, anchor)
//! 3. a single write through the batch store that re-runs the guards inside the
//!    store's critical section, pinned to the expected status where there is one
//! 4. post-commit follow-ups (ledger anchors, notifications) whose failures are
//!    reported on the `TransitionReport` instead of undoing the transition

pub mod bidding;
pub mod claim;
pub mod cultivation;
pub mod guards;
pub mod production;
pub mod queries;
pub mod report;

pub use bidding::LabelGenerator;
pub use guards::{ActorScope, Operation, Precondition, StatusPattern, TransitionRule, TRANSITION_RULES};
pub use report::{FollowUpFailure, FollowUpStep, TransitionReport};

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use crate::batch::{AnchorKind, BatchRecord, Evidence, LedgerReference};
use crate::config::LabelConfig;
use crate::error::LifecycleError;
use crate::external::{AnchorPayload, Collaborators, ContentId, TransactionId};
use crate::identity::Identity;
use crate::notifications::{LifecycleEvent, NotificationDispatcher};
use crate::observability::{LifecycleMetrics, OperationTimer};
use crate::store::{BatchStore, ConditionalWrite};
use crate::telemetry::{create_lifecycle_span, generate_correlation_id};
use guards::GuardInput;

/// Record-side effect of a transition, applied after the guards pass.
type Apply<'a> = &'a (dyn Fn(&mut BatchRecord) -> Result<(), LifecycleError> + Send + Sync);

pub struct BatchLifecycle {
    store: Arc<dyn BatchStore>,
    collaborators: Collaborators,
    notifications: NotificationDispatcher,
    labels: LabelGenerator,
    metrics: Arc<LifecycleMetrics>,
}

impl BatchLifecycle {
    pub fn new(
        store: Arc<dyn BatchStore>,
        collaborators: Collaborators,
        notifications: NotificationDispatcher,
        labels: LabelConfig,
    ) -> Self {
        Self {
            store,
            collaborators,
            notifications,
            labels: LabelGenerator::new(labels),
            metrics: Arc::new(LifecycleMetrics::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn BatchStore> {
        &self.store
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.notifications
    }

    pub fn metrics(&self) -> &LifecycleMetrics {
        &self.metrics
    }

    /// Run one transition inside its span, timing it and counting the outcome.
    async fn observe<T, F>(
        &self,
        operation: Operation,
        batch_id: Option<&str>,
        caller: &Identity,
        work: F,
    ) -> Result<T, LifecycleError>
    where
        F: Future<Output = Result<T, LifecycleError>>,
    {
        let correlation_id = generate_correlation_id();
        let span = create_lifecycle_span(operation.name(), batch_id, &caller.actor_id, &correlation_id);
        let timer = OperationTimer::new(operation.name());

        let result = work.instrument(span.clone()).await;

        let _entered = span.enter();
        match &result {
            Ok(_) => self.metrics.record_transition(),
            Err(error) => {
                self.metrics.record_failure(error.kind());
                warn!(error_kind = %error.kind(), error = %error, "Transition rejected");
            }
        }
        timer.finish();
        result
    }

    /// Load the record and run the guards against it.
    async fn load_checked(
        &self,
        operation: Operation,
        caller: &Identity,
        input: &GuardInput<'_>,
        batch_id: &str,
    ) -> Result<BatchRecord, LifecycleError> {
        let record = self.store.get(batch_id).await?;
        guards::check(operation, caller, input, &record)?;
        Ok(record)
    }

    /// The single write of a transition.
    ///
    /// Guards are evaluated again on the stored copy inside the store's critical
    /// section. Operations with one legal starting status go through `update_if`.
    async fn commit(
        &self,
        operation: Operation,
        caller: &Identity,
        input: &GuardInput<'_>,
        batch_id: &str,
        apply: Apply<'_>,
    ) -> Result<BatchRecord, LifecycleError> {
        let guarded = |record: &mut BatchRecord| {
            guards::check(operation, caller, input, record)?;
            apply(record)
        };

        let record = match guards::rule_for(operation).from.pinned() {
            Some(expected) => match self.store.update_if(batch_id, expected, &guarded).await? {
                ConditionalWrite::Applied(record) => record,
                ConditionalWrite::StatusMismatch { actual } => {
                    return Err(guards::status_rejection(operation, actual))
                }
            },
            None => self.store.update(batch_id, &guarded).await?,
        };

        info!(
            batch_id = %record.batch_id,
            status = %record.status,
            version = record.version,
            "Transition committed"
        );
        Ok(record)
    }

    async fn upload(&self, evidence: Option<&Evidence>) -> Result<Option<ContentId>, LifecycleError> {
        let Some(evidence) = evidence else {
            return Ok(None);
        };
        self.collaborators
            .blobs
            .upload(&evidence.bytes, &evidence.file_name)
            .await
            .map(Some)
            .map_err(|e| LifecycleError::collaborator("blob store", e))
    }

    async fn notify(&self, event: LifecycleEvent, follow_ups: &mut Vec<FollowUpFailure>) {
        match self.notifications.publish(event).await {
            Ok(records) => self.metrics.record_notifications(records.len()),
            Err(error) => {
                warn!(error = %error, "Notification dispatch failed after commit");
                self.metrics.record_follow_up_failure();
                follow_ups.push(FollowUpFailure::new(FollowUpStep::Notification, &error));
            }
        }
    }

    /// Ledger call for an already committed transition. Failure leaves the record as
    /// committed and is reported for `retry_anchor`.
    async fn anchor_after_commit(
        &self,
        kind: AnchorKind,
        record: BatchRecord,
        follow_ups: &mut Vec<FollowUpFailure>,
    ) -> BatchRecord {
        let outcome = match self.anchor(kind, &record).await {
            Ok(transaction_id) => self.record_anchor(&record.batch_id, kind, transaction_id).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(updated) => updated,
            Err(error) => {
                warn!(batch_id = %record.batch_id, kind = %kind, error = %error, "Anchoring failed after commit");
                self.metrics.record_follow_up_failure();
                follow_ups.push(FollowUpFailure::new(FollowUpStep::Anchor(kind), &error));
                record
            }
        }
    }

    async fn anchor(&self, kind: AnchorKind, record: &BatchRecord) -> Result<TransactionId, LifecycleError> {
        let payload = AnchorPayload::for_record(kind, record);
        self.collaborators
            .ledger
            .anchor(&payload)
            .await
            .map_err(|e| LifecycleError::collaborator("ledger", e))
    }

    /// Append a ledger reference; at most one per kind.
    async fn record_anchor(
        &self,
        batch_id: &str,
        kind: AnchorKind,
        transaction_id: TransactionId,
    ) -> Result<BatchRecord, LifecycleError> {
        let reference = LedgerReference {
            kind,
            transaction_id,
            recorded_at: Utc::now(),
        };
        self.store
            .update(batch_id, &|record| {
                if record.ledger_reference(kind).is_some() {
                    return Err(LifecycleError::conflict(format!(
                        "batch {batch_id} already has a {kind} anchor"
                    )));
                }
                record.ledger_references.push(reference.clone());
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{
        BatchStatus, FinalAnchorRequest, GeoPoint, GrowthProof, LabResult, NewBatch,
        FAILING_QUALITY_SCORE, PASSING_QUALITY_SCORE,
    };
    use crate::error::ErrorKind;
    use crate::external::{
        CollaboratorError, MemoryDirectory, MockBlobStore, MockLedger, MockReverseGeocoder,
        MockSpeciesClassifier,
    };
    use crate::notifications::MemoryNotificationStore;
    use crate::store::MemoryBatchStore;

    fn lifecycle_with(collaborators: Collaborators) -> BatchLifecycle {
        lifecycle_on(Arc::new(MemoryBatchStore::new()), collaborators)
    }

    fn lifecycle_on(store: Arc<MemoryBatchStore>, collaborators: Collaborators) -> BatchLifecycle {
        BatchLifecycle::new(
            store,
            collaborators,
            NotificationDispatcher::new(
                Arc::new(MemoryNotificationStore::new()),
                Arc::new(MemoryDirectory::new()),
            ),
            LabelConfig::default(),
        )
    }

    fn collector() -> Identity {
        Identity::collector("C-1", "Ravi")
    }

    async fn create(lifecycle: &BatchLifecycle) -> TransitionReport {
        lifecycle
            .create_batch(
                &collector(),
                NewBatch {
                    herb_name: "Tulsi".to_string(),
                    farm_location: "Mysuru".to_string(),
                },
            )
            .await
            .unwrap()
    }

    /// A packaged batch "B1" owned by `collector()`.
    fn packaged_record(lab_passed: bool) -> BatchRecord {
        let mut record = BatchRecord::new(
            "B1".to_string(),
            "Tulsi".to_string(),
            "Mysuru".to_string(),
            collector().actor_ref(),
        );
        record.status = BatchStatus::Packaged;
        record.lab_result = Some(LabResult {
            passed: lab_passed,
            report_content_id: None,
            quality_score: if lab_passed {
                PASSING_QUALITY_SCORE
            } else {
                FAILING_QUALITY_SCORE
            },
            remarks: None,
            submitted_at: Utc::now(),
        });
        record
    }

    fn final_photo() -> FinalAnchorRequest {
        FinalAnchorRequest {
            species_photo: Evidence::new("final.jpg", b"photo".to_vec()),
        }
    }

    fn growth_proof(photo: bool) -> GrowthProof {
        GrowthProof {
            stage: 1,
            notes: "first leaves".to_string(),
            photo: photo.then(|| Evidence::new("leaf.jpg", b"leaf".to_vec())),
            gps: Some(GeoPoint {
                latitude: 12.3,
                longitude: 76.6,
            }),
        }
    }

    #[tokio::test]
    async fn test_geocoder_failure_leaves_address_empty() {
        let mut geocoder = MockReverseGeocoder::new();
        geocoder
            .expect_lookup()
            .times(1)
            .returning(|_, _| Err(CollaboratorError::unavailable("geocoder", "quota exceeded")));
        let lifecycle = lifecycle_with(Collaborators {
            geocoder: Arc::new(geocoder),
            ..Collaborators::in_memory("Tulsi")
        });
        let batch_id = create(&lifecycle).await.record.batch_id;

        let record = lifecycle
            .submit_growth_proof(&collector(), &batch_id, growth_proof(false))
            .await
            .unwrap()
            .into_record();
        let growth = record.growth_records.values().next().unwrap();
        assert!(growth.address.is_none());
        assert!(growth.gps.is_some());
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_before_the_write() {
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_upload()
            .returning(|_, _| Err(CollaboratorError::rejected("blob store", "too large")));
        let lifecycle = lifecycle_with(Collaborators {
            blobs: Arc::new(blobs),
            ..Collaborators::in_memory("Tulsi")
        });
        let batch_id = create(&lifecycle).await.record.batch_id;
        let before = lifecycle.get_batch(&batch_id).await.unwrap();

        let err = lifecycle
            .submit_growth_proof(&collector(), &batch_id, growth_proof(true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
        assert_eq!(lifecycle.get_batch(&batch_id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_creation_anchor_failure_is_reported_not_raised() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_anchor()
            .times(1)
            .returning(|_| Err(CollaboratorError::unavailable("ledger", "node down")));
        let lifecycle = lifecycle_with(Collaborators {
            ledger: Arc::new(ledger),
            ..Collaborators::in_memory("Tulsi")
        });

        let report = create(&lifecycle).await;
        assert_eq!(report.record.status, BatchStatus::Planting);
        assert_eq!(
            report.follow_ups[0].step,
            FollowUpStep::Anchor(AnchorKind::Creation)
        );
        assert_eq!(lifecycle.metrics().get_stats().follow_up_failures, 1);
    }

    #[tokio::test]
    async fn test_classifier_error_skips_the_ledger() {
        let mut classifier = MockSpeciesClassifier::new();
        classifier
            .expect_classify()
            .returning(|_| Err(CollaboratorError::unavailable("species classifier", "model offline")));
        let mut ledger = MockLedger::new();
        ledger.expect_anchor().never();
        let lifecycle = lifecycle_with(Collaborators {
            classifier: Arc::new(classifier),
            ledger: Arc::new(ledger),
            ..Collaborators::in_memory("Tulsi")
        });

        lifecycle.store().insert(packaged_record(true)).await.unwrap();

        let err = lifecycle
            .anchor_final(&collector(), "B1", final_photo())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
        assert_eq!(
            lifecycle.get_batch("B1").await.unwrap().status,
            BatchStatus::Packaged
        );
    }

    #[tokio::test]
    async fn test_failed_lab_stops_final_anchor_before_any_collaborator() {
        let mut classifier = MockSpeciesClassifier::new();
        classifier.expect_classify().never();
        let mut ledger = MockLedger::new();
        ledger.expect_anchor().never();
        let lifecycle = lifecycle_with(Collaborators {
            classifier: Arc::new(classifier),
            ledger: Arc::new(ledger),
            ..Collaborators::in_memory("Tulsi")
        });
        lifecycle.store().insert(packaged_record(false)).await.unwrap();
        let before = lifecycle.get_batch("B1").await.unwrap();

        let err = lifecycle
            .anchor_final(&collector(), "B1", final_photo())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(lifecycle.get_batch("B1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_final_anchor_losing_the_write_reports_its_transaction() {
        let store = Arc::new(MemoryBatchStore::new());
        store.insert(packaged_record(true)).await.unwrap();

        // A rival anchor lands while this call is at the ledger.
        let rival = store.clone();
        let mut ledger = MockLedger::new();
        ledger.expect_anchor().times(1).returning(move |_| {
            futures::executor::block_on(rival.update("B1", &|record| {
                record.ledger_references.push(LedgerReference {
                    kind: AnchorKind::Final,
                    transaction_id: "0xrival".to_string(),
                    recorded_at: Utc::now(),
                });
                record.status = BatchStatus::BlockchainAnchored;
                Ok(())
            }))
            .map_err(|e| CollaboratorError::unavailable("ledger", e.to_string()))?;
            Ok("0xlate".to_string())
        });
        let lifecycle = lifecycle_on(
            store,
            Collaborators {
                ledger: Arc::new(ledger),
                ..Collaborators::in_memory("Tulsi")
            },
        );

        let err = lifecycle
            .anchor_final(&collector(), "B1", final_photo())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        match err {
            LifecycleError::UnrecordedAnchor { transaction_id, .. } => {
                assert_eq!(transaction_id, "0xlate")
            }
            other => panic!("expected an unrecorded anchor, got {other:?}"),
        }
        let record = lifecycle.get_batch("B1").await.unwrap();
        assert_eq!(
            record.ledger_reference(AnchorKind::Final).unwrap().transaction_id,
            "0xrival"
        );
    }
}
