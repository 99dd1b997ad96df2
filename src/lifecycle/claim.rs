// Lab testing: first-claim-wins task acceptance and result submission

use chrono::Utc;
use tracing::info;

use super::guards::{self, cultivator_of, GuardInput, Operation};
use super::{BatchLifecycle, TransitionReport};
use crate::batch::{
    BatchStatus, LabAssignment, LabReport, LabResult, FAILING_QUALITY_SCORE, PASSING_QUALITY_SCORE,
};
use crate::error::LifecycleError;
use crate::identity::Identity;
use crate::notifications::LifecycleEvent;
use crate::store::ConditionalWrite;

impl BatchLifecycle {
    /// Claim a published lab task.
    ///
    /// Any number of testers may call this concurrently; the store's conditional
    /// write on `testing_assigned` lets exactly one through. Everyone else gets
    /// `Conflict`, never `NotFound`.
    pub async fn accept_test_task(
        &self,
        caller: &Identity,
        batch_id: &str,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::AcceptTestTask;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;

            // existence, and a clearer error for batches that were never published
            let current = self.store.get(batch_id).await?;
            if current.status.phase() < BatchStatus::TestingAssigned.phase() {
                return Err(guards::status_rejection(operation, current.status));
            }

            let assignment = LabAssignment {
                tester_id: caller.actor_id.clone(),
                tester_name: caller.display_name.clone(),
                accepted_at: Utc::now(),
            };
            let outcome = self
                .store
                .update_if(batch_id, BatchStatus::TestingAssigned, &|record| {
                    record.lab_assignment = Some(assignment.clone());
                    record.status = BatchStatus::TestingInProgress;
                    Ok(())
                })
                .await?;

            let record = match outcome {
                ConditionalWrite::Applied(record) => record,
                ConditionalWrite::StatusMismatch { actual } => {
                    self.metrics.record_claim_conflict();
                    return Err(LifecycleError::conflict(format!(
                        "batch {batch_id} was already claimed (now {actual})"
                    )));
                }
            };
            info!(batch_id = %batch_id, tester_id = %caller.actor_id, "Lab task claimed");

            let mut follow_ups = Vec::new();
            self.notify(
                LifecycleEvent::TestAccepted {
                    batch_id: record.batch_id.clone(),
                    tester_name: caller.display_name.clone(),
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }

    /// Submit the lab verdict. A pass opens bidding, a fail rejects the batch.
    pub async fn submit_lab_result(
        &self,
        caller: &Identity,
        batch_id: &str,
        report: LabReport,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::SubmitLabResult;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            let input = GuardInput::default();
            self.load_checked(operation, caller, &input, batch_id).await?;

            let report_content_id = self.upload(report.report.as_ref()).await?;
            let result = LabResult {
                passed: report.passed,
                report_content_id,
                quality_score: if report.passed {
                    PASSING_QUALITY_SCORE
                } else {
                    FAILING_QUALITY_SCORE
                },
                remarks: report
                    .remarks
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
                submitted_at: Utc::now(),
            };
            let next_status = if report.passed {
                BatchStatus::BiddingOpen
            } else {
                BatchStatus::Rejected
            };

            let record = self
                .commit(operation, caller, &input, batch_id, &|record| {
                    record.lab_result = Some(result.clone());
                    record.status = next_status;
                    Ok(())
                })
                .await?;
            info!(batch_id = %batch_id, passed = report.passed, "Lab result recorded");

            let event = if report.passed {
                LifecycleEvent::BiddingOpened {
                    batch_id: record.batch_id.clone(),
                }
            } else {
                LifecycleEvent::BatchRejected {
                    batch_id: record.batch_id.clone(),
                    collector_id: cultivator_of(&record).clone(),
                }
            };
            let mut follow_ups = Vec::new();
            self.notify(event, &mut follow_ups).await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }
}
