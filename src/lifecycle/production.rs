// Manufacturing, packaging and ledger anchoring

use chrono::Utc;
use tracing::{info, warn};

use super::guards::{self, cultivator_of, GuardInput, Operation};
use super::{BatchLifecycle, TransitionReport};
use crate::batch::{
    AnchorKind, BatchStatus, FinalAnchorRequest, LedgerReference, ManufacturingRecord,
    ManufacturingSubmission, PackagingRecord, PackagingSubmission,
};
use crate::error::LifecycleError;
use crate::external::classifier::species_matches;
use crate::identity::Identity;
use crate::notifications::LifecycleEvent;

impl BatchLifecycle {
    pub async fn submit_manufacturing(
        &self,
        caller: &Identity,
        batch_id: &str,
        submission: ManufacturingSubmission,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::SubmitManufacturing;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            submission.validate()?;
            let input = GuardInput::default();
            self.load_checked(operation, caller, &input, batch_id).await?;

            let certificate_content_id = self.upload(submission.certificate.as_ref()).await?;
            let manufacturing = ManufacturingRecord {
                received_quantity_kg: submission.received_quantity_kg,
                process_steps: submission
                    .process_steps
                    .iter()
                    .map(|step| step.trim().to_string())
                    .filter(|step| !step.is_empty())
                    .collect(),
                final_quantity_kg: submission.final_quantity_kg,
                product_form: submission.product_form.trim().to_string(),
                storage_conditions: submission.storage_conditions.clone(),
                certificate_content_id,
                submitted_at: Utc::now(),
            };

            let record = self
                .commit(operation, caller, &input, batch_id, &|record| {
                    record.manufacturing_record = Some(manufacturing.clone());
                    record.status = BatchStatus::ManufacturingDone;
                    Ok(())
                })
                .await?;

            let mut follow_ups = Vec::new();
            self.notify(
                LifecycleEvent::ManufacturingCompleted {
                    batch_id: record.batch_id.clone(),
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }

    /// Record packaging under a public unit id (the label id unless one is given).
    /// The unit id may not name any other batch; the store enforces this again as
    /// part of the write. The packaging anchor runs after the commit.
    pub async fn complete_packaging(
        &self,
        caller: &Identity,
        batch_id: &str,
        submission: PackagingSubmission,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::CompletePackaging;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            submission.validate()?;
            let input = GuardInput::default();
            let snapshot = self.load_checked(operation, caller, &input, batch_id).await?;

            let unit_id = match &submission.unit_id {
                Some(unit_id) => unit_id.trim().to_string(),
                None => snapshot
                    .manufacturer_assignment
                    .as_ref()
                    .map(|assignment| assignment.label_id.clone())
                    .ok_or_else(|| {
                        LifecycleError::invalid_state(operation.name(), "batch has no label id")
                    })?,
            };
            if let Some(other) = self.store.find_by_unit_id(&unit_id).await? {
                if other.batch_id != batch_id {
                    return Err(LifecycleError::conflict(format!(
                        "unit id {unit_id} is already used by batch {}",
                        other.batch_id
                    )));
                }
            }
            if unit_id != batch_id {
                match self.store.get(&unit_id).await {
                    Ok(_) => {
                        return Err(LifecycleError::conflict(format!(
                            "unit id {unit_id} is the id of another batch"
                        )))
                    }
                    Err(LifecycleError::NotFound { .. }) => {}
                    Err(error) => return Err(error),
                }
            }

            let packaging = PackagingRecord {
                unit_id: unit_id.clone(),
                packaging_batch_number: submission.packaging_batch_number.trim().to_string(),
                barcode: submission.barcode.clone(),
                packaged_at: Utc::now(),
            };
            let record = self
                .commit(operation, caller, &input, batch_id, &|record| {
                    record.packaging_record = Some(packaging.clone());
                    record.status = BatchStatus::Packaged;
                    Ok(())
                })
                .await?;

            let mut follow_ups = Vec::new();
            let record = self
                .anchor_after_commit(AnchorKind::Packaging, record, &mut follow_ups)
                .await;
            self.notify(
                LifecycleEvent::Packaged {
                    batch_id: record.batch_id.clone(),
                    collector_id: cultivator_of(&record).clone(),
                    unit_id,
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }

    /// Final anchoring by the collector.
    ///
    /// Checks run in this order: lab passed, species photo matches the herb, no
    /// earlier final anchor. The ledger is called before the write, so a ledger
    /// failure leaves the record untouched.
    pub async fn anchor_final(
        &self,
        caller: &Identity,
        batch_id: &str,
        request: FinalAnchorRequest,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::AnchorFinal;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            let input = GuardInput::default();
            let snapshot = self.load_checked(operation, caller, &input, batch_id).await?;

            let label = self
                .collaborators
                .classifier
                .classify(&request.species_photo.bytes)
                .await
                .map_err(|e| LifecycleError::collaborator("species classifier", e))?;
            if !species_matches(&snapshot.herb_name, &label) {
                return Err(LifecycleError::invalid_state(
                    operation.name(),
                    format!(
                        "photo classified as {label}, batch {batch_id} is {}",
                        snapshot.herb_name
                    ),
                ));
            }

            let transaction_id = self.anchor(AnchorKind::Final, &snapshot).await?;
            let reference = LedgerReference {
                kind: AnchorKind::Final,
                transaction_id: transaction_id.clone(),
                recorded_at: Utc::now(),
            };

            let committed = self
                .commit(operation, caller, &input, batch_id, &|record| {
                    record.ledger_references.push(reference.clone());
                    record.status = BatchStatus::BlockchainAnchored;
                    Ok(())
                })
                .await;
            let record = match committed {
                Ok(record) => record,
                Err(error) => {
                    warn!(batch_id = %batch_id, transaction_id = %transaction_id, "Final anchor written to the ledger but not recorded");
                    return Err(LifecycleError::UnrecordedAnchor {
                        transaction_id,
                        source: Box::new(error),
                    });
                }
            };
            info!(batch_id = %batch_id, transaction_id = %transaction_id, "Batch anchored");

            let mut follow_ups = Vec::new();
            self.notify(
                LifecycleEvent::FinalAnchored {
                    batch_id: record.batch_id.clone(),
                    transaction_id,
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }

    /// Re-attempt a creation or packaging anchor that failed after its transition
    /// committed. An anchor already on record is a `Conflict`.
    pub async fn retry_anchor(
        &self,
        caller: &Identity,
        batch_id: &str,
        kind: AnchorKind,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::RetryAnchor;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            if kind == AnchorKind::Final {
                return Err(LifecycleError::invalid_input(
                    "final anchors are only written by anchor_final",
                ));
            }

            let snapshot = self
                .load_checked(operation, caller, &GuardInput::default(), batch_id)
                .await?;
            if kind == AnchorKind::Packaging && snapshot.packaging_record.is_none() {
                return Err(LifecycleError::invalid_state(
                    operation.name(),
                    format!("batch {batch_id} has not been packaged"),
                ));
            }
            if snapshot.ledger_reference(kind).is_some() {
                return Err(LifecycleError::conflict(format!(
                    "batch {batch_id} already has a {kind} anchor"
                )));
            }

            let transaction_id = self.anchor(kind, &snapshot).await?;
            let record = self.record_anchor(batch_id, kind, transaction_id).await?;
            info!(batch_id = %batch_id, kind = %kind, "Anchor retried");
            Ok(TransitionReport::new(record))
        })
        .await
    }
}
