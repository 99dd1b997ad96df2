// Cultivation phase: batch creation, collector assignment, growth proofs and
// publication for lab testing

use chrono::Utc;
use tracing::{info, warn};

use super::guards::{self, GuardInput, Operation};
use super::{BatchLifecycle, TransitionReport};
use crate::batch::{
    new_batch_id, AnchorKind, AssignCollector, BatchRecord, BatchStatus, CollectorAssignment,
    GeoPoint, GrowthProof, GrowthRecord, GrowthStage, NewBatch,
};
use crate::error::LifecycleError;
use crate::identity::Identity;
use crate::notifications::LifecycleEvent;

impl BatchLifecycle {
    /// Register a new batch in `planting`. The creation anchor runs after the insert.
    pub async fn create_batch(
        &self,
        caller: &Identity,
        command: NewBatch,
    ) -> Result<TransitionReport, LifecycleError> {
        self.observe(Operation::CreateBatch, None, caller, async {
            guards::authorize_role(Operation::CreateBatch, caller)?;
            command.validate()?;

            let record = BatchRecord::new(
                new_batch_id(),
                command.herb_name.trim().to_string(),
                command.farm_location.trim().to_string(),
                caller.actor_ref(),
            );
            let record = self.store.insert(record).await?;
            info!(batch_id = %record.batch_id, herb_name = %record.herb_name, "Batch created");

            let mut follow_ups = Vec::new();
            let record = self
                .anchor_after_commit(AnchorKind::Creation, record, &mut follow_ups)
                .await;
            self.notify(
                LifecycleEvent::BatchCreated {
                    batch_id: record.batch_id.clone(),
                    herb_name: record.herb_name.clone(),
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }

    pub async fn assign_collector(
        &self,
        caller: &Identity,
        batch_id: &str,
        command: AssignCollector,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::AssignCollector;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            command.validate()?;

            let assignment = CollectorAssignment {
                actor_id: command.collector_id.clone(),
                actor_name: command.collector_name.clone(),
                visit_date: command.visit_date,
                assigned_at: Utc::now(),
            };
            let record = self
                .commit(operation, caller, &GuardInput::default(), batch_id, &|record| {
                    record.collector_assignment = Some(assignment.clone());
                    record.status = BatchStatus::CollectionAssigned;
                    Ok(())
                })
                .await?;

            let mut follow_ups = Vec::new();
            self.notify(
                LifecycleEvent::CollectorAssigned {
                    batch_id: record.batch_id.clone(),
                    collector_id: assignment.actor_id.clone(),
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }

    /// Record one growth stage. Photo upload and reverse geocoding happen before the
    /// write; a geocoder failure only leaves the address empty.
    pub async fn submit_growth_proof(
        &self,
        caller: &Identity,
        batch_id: &str,
        command: GrowthProof,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::SubmitGrowthProof;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            command.validate()?;
            let stage = GrowthStage::new(command.stage)?;
            let input = GuardInput {
                stage: Some(stage),
                ..GuardInput::default()
            };

            self.load_checked(operation, caller, &input, batch_id).await?;

            let content_id = self.upload(command.photo.as_ref()).await?;
            let address = match command.gps {
                Some(gps) => self.reverse_geocode(gps).await,
                None => None,
            };

            let growth = GrowthRecord {
                content_id,
                notes: command.notes.trim().to_string(),
                gps: command.gps,
                address,
                recorded_by: caller.actor_id.clone(),
                recorded_at: Utc::now(),
            };
            let record = self
                .commit(operation, caller, &input, batch_id, &|record| {
                    record.growth_records.insert(stage, growth.clone());
                    record.status = BatchStatus::GrowingStage(stage);
                    Ok(())
                })
                .await?;
            Ok(TransitionReport::new(record))
        })
        .await
    }

    /// Move a cultivated batch to `testing_assigned` and tell every tester.
    pub async fn publish_for_testing(
        &self,
        caller: &Identity,
        batch_id: &str,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::PublishForTesting;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;

            let published_at = Utc::now();
            let record = self
                .commit(operation, caller, &GuardInput::default(), batch_id, &|record| {
                    record.status = BatchStatus::TestingAssigned;
                    record.testing_published_at = Some(published_at);
                    Ok(())
                })
                .await?;

            let mut follow_ups = Vec::new();
            self.notify(
                LifecycleEvent::TestingPublished {
                    batch_id: record.batch_id.clone(),
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }

    async fn reverse_geocode(&self, gps: GeoPoint) -> Option<String> {
        match self
            .collaborators
            .geocoder
            .lookup(gps.latitude, gps.longitude)
            .await
        {
            Ok(address) => Some(address),
            Err(error) => {
                warn!(gps = %gps, error = %error, "Reverse geocoding failed, leaving address empty");
                None
            }
        }
    }
}
