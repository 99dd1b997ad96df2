use std::sync::Arc;
use tracing::{debug, warn};

use super::gateway::ContentGateway;
use super::types::{MediaItem, ProvenanceStage, PublicProvenance, StageKind, VerificationState};
use crate::batch::{AnchorKind, BatchRecord, BatchStatus};
use crate::error::LifecycleError;
use crate::external::{Ledger, LedgerVerification};
use crate::store::BatchStore;

/// Quality score above which a lab pass earns the top grade.
const TOP_GRADE_THRESHOLD: u8 = 90;

/// Read-only projection of a batch for unauthenticated consumers.
#[derive(Clone)]
pub struct ProvenanceProjector {
    store: Arc<dyn BatchStore>,
    ledger: Arc<dyn Ledger>,
    gateway: ContentGateway,
}

impl ProvenanceProjector {
    pub fn new(
        store: Arc<dyn BatchStore>,
        ledger: Arc<dyn Ledger>,
        gateway: ContentGateway,
    ) -> Self {
        Self {
            store,
            ledger,
            gateway,
        }
    }

    /// Look `public_id` up as a unit or label id first, then as a batch id.
    ///
    /// Ledger trouble never fails the projection; it only downgrades the
    /// verification state.
    pub async fn project(&self, public_id: &str) -> Result<PublicProvenance, LifecycleError> {
        let record = match self.store.find_by_unit_id(public_id).await? {
            Some(record) => record,
            None => match self.store.get(public_id).await {
                Ok(record) => record,
                Err(LifecycleError::NotFound { .. }) => {
                    return Err(LifecycleError::NotFound {
                        entity: "product",
                        id: public_id.to_string(),
                    })
                }
                Err(error) => return Err(error),
            },
        };

        let display_id = record
            .unit_id()
            .map(str::to_string)
            .unwrap_or_else(|| record.batch_id.clone());

        let (verification, verified_tx) = match self.ledger.verify(&display_id).await {
            Ok(LedgerVerification {
                verified: true,
                transaction_id,
            }) => (VerificationState::ChainVerified, transaction_id),
            Ok(_) => (VerificationState::AnchorMissing, None),
            Err(error) => {
                warn!(public_id = %display_id, error = %error, "Ledger verification unavailable");
                (VerificationState::Unverified, None)
            }
        };

        let recorded_tx = record
            .ledger_reference(AnchorKind::Final)
            .or_else(|| record.ledger_reference(AnchorKind::Packaging))
            .map(|reference| reference.transaction_id.clone());

        let stages = self.stages(&record);
        debug!(public_id = %display_id, stages = stages.len(), "Projected provenance");

        Ok(PublicProvenance {
            public_id: display_id,
            batch_id: record.batch_id.clone(),
            product_name: record.herb_name.clone(),
            status: record.status,
            farmer_name: record.created_by.actor_name.clone(),
            farm_location: record.farm_location.clone(),
            verification,
            transaction_id: verified_tx.or(recorded_tx),
            quality_grade: record.lab_result.as_ref().map(|result| {
                if result.quality_score > TOP_GRADE_THRESHOLD {
                    "A+".to_string()
                } else {
                    "B".to_string()
                }
            }),
            stages,
        })
    }

    fn media(&self, title: &str, content_id: &str, description: Option<String>) -> MediaItem {
        MediaItem {
            title: title.to_string(),
            content_id: content_id.to_string(),
            url: self.gateway.url_for(content_id),
            description,
        }
    }

    fn stages(&self, record: &BatchRecord) -> Vec<ProvenanceStage> {
        let mut stages = Vec::new();
        let collector_name = record
            .collector_assignment
            .as_ref()
            .map(|a| a.actor_name.as_str())
            .unwrap_or(record.created_by.actor_name.as_str());

        for (stage, growth) in &record.growth_records {
            let Some(content_id) = &growth.content_id else {
                continue;
            };
            stages.push(ProvenanceStage {
                position: stages.len() + 1,
                kind: StageKind::Cultivation,
                name: format!("Cultivation Stage {stage} Verified"),
                recorded_at: growth.recorded_at,
                location: growth
                    .address
                    .clone()
                    .unwrap_or_else(|| record.farm_location.clone()),
                description: format!("Stage {stage} proof submitted by collector {collector_name}."),
                media: vec![self.media(
                    "Verification Photo",
                    content_id,
                    Some(growth.notes.clone()).filter(|n| !n.is_empty()),
                )],
            });
        }

        if let Some(result) = &record.lab_result {
            if let Some(report) = &result.report_content_id {
                let tester = record
                    .lab_assignment
                    .as_ref()
                    .map(|a| a.tester_name.as_str())
                    .unwrap_or("unknown");
                let verdict = if result.passed { "Passed" } else { "Failed" };
                stages.push(ProvenanceStage {
                    position: stages.len() + 1,
                    kind: StageKind::LabTesting,
                    name: "Quality Testing & Lab Verification".to_string(),
                    recorded_at: result.submitted_at,
                    location: format!("Lab tester: {tester}"),
                    description: format!("Purity test {}.", verdict.to_lowercase()),
                    media: vec![self.media(
                        "Official Lab Test Report",
                        report,
                        Some(format!("Purity test results: {verdict}.")),
                    )],
                });
            }
        }

        let manufactured = matches!(
            record.status,
            BatchStatus::ManufacturingDone | BatchStatus::Packaged | BatchStatus::BlockchainAnchored
        );
        if manufactured {
            let facility = record
                .manufacturer_assignment
                .as_ref()
                .map(|a| a.manufacturer_name.as_str())
                .unwrap_or("GMP facility");

            if let Some(manufacturing) = &record.manufacturing_record {
                stages.push(ProvenanceStage {
                    position: stages.len() + 1,
                    kind: StageKind::Manufacturing,
                    name: "Manufacturing".to_string(),
                    recorded_at: manufacturing.submitted_at,
                    location: facility.to_string(),
                    description: format!(
                        "Processed into {} ({} kg from {} kg).",
                        manufacturing.product_form,
                        manufacturing.final_quantity_kg,
                        manufacturing.received_quantity_kg
                    ),
                    media: manufacturing
                        .certificate_content_id
                        .iter()
                        .map(|cid| self.media("Manufacturing Certificate", cid, None))
                        .collect(),
                });
            }

            if let Some(packaging) = &record.packaging_record {
                stages.push(ProvenanceStage {
                    position: stages.len() + 1,
                    kind: StageKind::Packaging,
                    name: "Final Packaging".to_string(),
                    recorded_at: packaging.packaged_at,
                    location: facility.to_string(),
                    description: format!(
                        "Packaged by {facility}. Final product id: {}.",
                        packaging.unit_id
                    ),
                    media: Vec::new(),
                });
            }
        }

        stages
    }
}
