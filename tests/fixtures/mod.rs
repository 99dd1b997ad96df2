// Shared setup for integration tests: an in-memory HerbTrace instance, a registered
// cast of actors and helpers that drive a batch to a given status.
#![allow(dead_code)]

use rust_decimal::Decimal;
use std::sync::Arc;

use herbtrace::batch::{
    Evidence, FinalAnchorRequest, LabReport, ManufacturerSelection, ManufacturingSubmission,
    NewBatch, PackagingSubmission, QuoteSubmission,
};
use herbtrace::store::BatchStore;
use herbtrace::{BatchId, HerbTrace, HerbTraceConfig, Identity, MemoryBatchStore};

pub const HERB: &str = "Tulsi";

pub struct Cast {
    pub admin: Identity,
    pub collector: Identity,
    pub other_collector: Identity,
    pub testers: Vec<Identity>,
    pub m1: Identity,
    pub m2: Identity,
}

impl Cast {
    pub fn new(tester_count: usize) -> Self {
        let config = HerbTraceConfig::default();
        Self {
            admin: Identity::admin(&config.admin.actor_id, &config.admin.display_name),
            collector: Identity::collector("C-1", "Ravi"),
            other_collector: Identity::collector("C-2", "Meena"),
            testers: (1..=tester_count)
                .map(|i| Identity::tester(&format!("T-{i}"), &format!("Lab {i}")))
                .collect(),
            m1: Identity::manufacturer("M-1", "Green Pharma"),
            m2: Identity::manufacturer("M-2", "Vedic Works"),
        }
    }

    pub fn tester(&self) -> &Identity {
        &self.testers[0]
    }
}

pub async fn harness() -> (HerbTrace, Cast) {
    harness_with(Arc::new(MemoryBatchStore::new()), 2, HERB).await
}

pub async fn harness_with(
    store: Arc<dyn BatchStore>,
    tester_count: usize,
    species_label: &str,
) -> (HerbTrace, Cast) {
    let app = HerbTrace::with_store(&HerbTraceConfig::default(), store, species_label)
        .await
        .unwrap();
    let cast = Cast::new(tester_count);
    let mut everyone = vec![
        cast.collector.clone(),
        cast.other_collector.clone(),
        cast.m1.clone(),
        cast.m2.clone(),
    ];
    everyone.extend(cast.testers.iter().cloned());
    for identity in everyone {
        app.directory.register(identity).await.unwrap();
    }
    (app, cast)
}

pub fn photo(name: &str) -> Evidence {
    Evidence::new(name, name.as_bytes().to_vec())
}

pub async fn new_batch(app: &HerbTrace, cast: &Cast) -> BatchId {
    app.lifecycle
        .create_batch(
            &cast.collector,
            NewBatch {
                herb_name: HERB.to_string(),
                farm_location: "Mysuru".to_string(),
            },
        )
        .await
        .unwrap()
        .record
        .batch_id
}

pub async fn testing_assigned(app: &HerbTrace, cast: &Cast) -> BatchId {
    let batch_id = new_batch(app, cast).await;
    app.lifecycle
        .publish_for_testing(&cast.admin, &batch_id)
        .await
        .unwrap();
    batch_id
}

pub async fn lab_decided(app: &HerbTrace, cast: &Cast, passed: bool) -> BatchId {
    let batch_id = testing_assigned(app, cast).await;
    app.lifecycle
        .accept_test_task(cast.tester(), &batch_id)
        .await
        .unwrap();
    app.lifecycle
        .submit_lab_result(
            cast.tester(),
            &batch_id,
            LabReport {
                passed,
                remarks: None,
                report: Some(photo("report.pdf")),
            },
        )
        .await
        .unwrap();
    batch_id
}

pub async fn bidding_open(app: &HerbTrace, cast: &Cast) -> BatchId {
    lab_decided(app, cast, true).await
}

pub async fn quote(app: &HerbTrace, manufacturer: &Identity, batch_id: &str, price: i64) {
    app.lifecycle
        .submit_quote(
            manufacturer,
            batch_id,
            QuoteSubmission {
                price: Decimal::from(price),
            },
        )
        .await
        .unwrap();
}

pub async fn manufacturing_assigned(app: &HerbTrace, cast: &Cast) -> BatchId {
    let batch_id = bidding_open(app, cast).await;
    quote(app, &cast.m1, &batch_id, 100).await;
    quote(app, &cast.m2, &batch_id, 90).await;
    app.lifecycle
        .select_manufacturer(
            &cast.admin,
            &batch_id,
            ManufacturerSelection {
                manufacturer_id: cast.m2.actor_id.clone(),
            },
        )
        .await
        .unwrap();
    batch_id
}

pub fn manufacturing_submission() -> ManufacturingSubmission {
    ManufacturingSubmission {
        received_quantity_kg: Decimal::from(50),
        process_steps: vec!["washing".to_string(), "drying".to_string()],
        final_quantity_kg: Decimal::from(40),
        product_form: "powder".to_string(),
        storage_conditions: None,
        certificate: None,
    }
}

pub fn packaging_submission() -> PackagingSubmission {
    PackagingSubmission {
        unit_id: None,
        packaging_batch_number: "PKG-1".to_string(),
        barcode: None,
    }
}

pub async fn packaged(app: &HerbTrace, cast: &Cast) -> BatchId {
    let batch_id = manufacturing_assigned(app, cast).await;
    app.lifecycle
        .submit_manufacturing(&cast.m2, &batch_id, manufacturing_submission())
        .await
        .unwrap();
    app.lifecycle
        .complete_packaging(&cast.m2, &batch_id, packaging_submission())
        .await
        .unwrap();
    batch_id
}

pub fn species_photo() -> FinalAnchorRequest {
    FinalAnchorRequest {
        species_photo: photo("final.jpg"),
    }
}
