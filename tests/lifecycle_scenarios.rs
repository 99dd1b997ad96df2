mod fixtures;

use fixtures::*;
use herbtrace::batch::{
    AnchorKind, AssignCollector, GeoPoint, GrowthProof, LabReport, ManufacturerSelection,
    PackagingSubmission,
};
use herbtrace::{BatchStatus, ErrorKind, FollowUpStep, MemoryBatchStore};
use std::sync::Arc;

#[tokio::test]
async fn test_full_chain_reaches_blockchain_anchored() {
    let (app, cast) = harness().await;
    let batch_id = packaged(&app, &cast).await;

    let report = app
        .lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap();

    assert!(report.is_clean());
    let record = report.into_record();
    assert_eq!(record.status, BatchStatus::BlockchainAnchored);
    let kinds: Vec<_> = record.ledger_references.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![AnchorKind::Creation, AnchorKind::Packaging, AnchorKind::Final]
    );
}

#[tokio::test]
async fn test_cultivation_steps_record_growth_proofs() {
    let (app, cast) = harness().await;
    let batch_id = new_batch(&app, &cast).await;

    let assigned = app
        .lifecycle
        .assign_collector(
            &cast.admin,
            &batch_id,
            AssignCollector {
                collector_id: cast.other_collector.actor_id.clone(),
                collector_name: cast.other_collector.display_name.clone(),
                visit_date: None,
            },
        )
        .await
        .unwrap()
        .into_record();
    assert_eq!(assigned.status, BatchStatus::CollectionAssigned);

    // the creator no longer owns cultivation once a collector is assigned
    let proof = |stage: u8| GrowthProof {
        stage,
        notes: format!("stage {stage}"),
        photo: Some(photo("leaf.jpg")),
        gps: Some(GeoPoint {
            latitude: 12.3,
            longitude: 76.6,
        }),
    };
    let err = app
        .lifecycle
        .submit_growth_proof(&cast.collector, &batch_id, proof(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let record = app
        .lifecycle
        .submit_growth_proof(&cast.other_collector, &batch_id, proof(1))
        .await
        .unwrap()
        .into_record();
    assert_eq!(record.status.to_string(), "growing_stage_1");
    let growth = record.growth_records.values().next().unwrap();
    assert!(growth.content_id.is_some());
    assert!(growth.address.is_some());

    let err = app
        .lifecycle
        .submit_growth_proof(&cast.other_collector, &batch_id, proof(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    app.lifecycle
        .submit_growth_proof(&cast.other_collector, &batch_id, proof(3))
        .await
        .unwrap();
    let err = app
        .lifecycle
        .submit_growth_proof(&cast.other_collector, &batch_id, proof(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = app
        .lifecycle
        .submit_growth_proof(&cast.other_collector, &batch_id, proof(6))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_second_collector_assignment_conflicts() {
    let (app, cast) = harness().await;
    let batch_id = new_batch(&app, &cast).await;
    let command = AssignCollector {
        collector_id: cast.collector.actor_id.clone(),
        collector_name: cast.collector.display_name.clone(),
        visit_date: None,
    };

    app.lifecycle
        .assign_collector(&cast.admin, &batch_id, command.clone())
        .await
        .unwrap();
    let err = app
        .lifecycle
        .assign_collector(&cast.admin, &batch_id, command)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_two_quotes_then_select_cheaper_manufacturer() {
    let (app, cast) = harness().await;
    let batch_id = manufacturing_assigned(&app, &cast).await;

    let record = app.lifecycle.get_batch(&batch_id).await.unwrap();
    assert_eq!(record.status, BatchStatus::ManufacturingAssigned);
    let assignment = record.manufacturer_assignment.unwrap();
    assert_eq!(assignment.manufacturer_id, cast.m2.actor_id);
    assert_eq!(assignment.price, rust_decimal::Decimal::from(90));

    let pattern = regex::Regex::new(&format!("^LBL-{}-\\d{{4}}$", regex::escape(&batch_id))).unwrap();
    assert!(
        pattern.is_match(&assignment.label_id),
        "unexpected label {}",
        assignment.label_id
    );

    let quotes = app.lifecycle.list_quotes(&cast.admin, &batch_id).await.unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0].manufacturer_id, cast.m1.actor_id);
}

#[tokio::test]
async fn test_failed_lab_rejects_and_blocks_final_anchor() {
    let (app, cast) = harness().await;
    let batch_id = lab_decided(&app, &cast, false).await;

    let record = app.lifecycle.get_batch(&batch_id).await.unwrap();
    assert_eq!(record.status, BatchStatus::Rejected);
    assert_eq!(record.lab_result.as_ref().unwrap().quality_score, 40);

    let err = app
        .lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = app
        .lifecycle
        .submit_quote(
            &cast.m1,
            &batch_id,
            herbtrace::batch::QuoteSubmission {
                price: rust_decimal::Decimal::from(10),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_wrong_role_is_forbidden_before_lookup() {
    let (app, cast) = harness().await;

    // role check runs first, even for a batch that does not exist
    let err = app
        .lifecycle
        .publish_for_testing(&cast.collector, "missing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = app
        .lifecycle
        .publish_for_testing(&cast.admin, "missing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unassigned_tester_cannot_submit_result() {
    let (app, cast) = harness().await;
    let batch_id = testing_assigned(&app, &cast).await;
    app.lifecycle
        .accept_test_task(&cast.testers[0], &batch_id)
        .await
        .unwrap();

    let err = app
        .lifecycle
        .submit_lab_result(
            &cast.testers[1],
            &batch_id,
            LabReport {
                passed: true,
                remarks: None,
                report: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(
        app.lifecycle.get_batch(&batch_id).await.unwrap().status,
        BatchStatus::TestingInProgress
    );
}

#[tokio::test]
async fn test_duplicate_quote_conflicts() {
    let (app, cast) = harness().await;
    let batch_id = bidding_open(&app, &cast).await;
    quote(&app, &cast.m1, &batch_id, 100).await;

    let err = app
        .lifecycle
        .submit_quote(
            &cast.m1,
            &batch_id,
            herbtrace::batch::QuoteSubmission {
                price: rust_decimal::Decimal::from(80),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        app.lifecycle.get_batch(&batch_id).await.unwrap().quotes.len(),
        1
    );
}

#[tokio::test]
async fn test_select_without_quote_leaves_batch_untouched() {
    let (app, cast) = harness().await;
    let batch_id = bidding_open(&app, &cast).await;
    quote(&app, &cast.m1, &batch_id, 100).await;
    let before = app.lifecycle.get_batch(&batch_id).await.unwrap();

    let err = app
        .lifecycle
        .select_manufacturer(
            &cast.admin,
            &batch_id,
            ManufacturerSelection {
                manufacturer_id: cast.m2.actor_id.clone(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(app.lifecycle.get_batch(&batch_id).await.unwrap(), before);
}

#[tokio::test]
async fn test_only_assigned_manufacturer_may_manufacture() {
    let (app, cast) = harness().await;
    let batch_id = manufacturing_assigned(&app, &cast).await;

    let err = app
        .lifecycle
        .submit_manufacturing(&cast.m1, &batch_id, manufacturing_submission())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let record = app
        .lifecycle
        .submit_manufacturing(&cast.m2, &batch_id, manufacturing_submission())
        .await
        .unwrap()
        .into_record();
    assert_eq!(record.status, BatchStatus::ManufacturingDone);
    assert_eq!(
        record.manufacturing_record.unwrap().process_steps,
        vec!["washing", "drying"]
    );
}

#[tokio::test]
async fn test_packaging_defaults_unit_id_to_label_and_rejects_reused_unit() {
    let (app, cast) = harness().await;
    let first = packaged(&app, &cast).await;
    let first_record = app.lifecycle.get_batch(&first).await.unwrap();
    let label_id = first_record.manufacturer_assignment.unwrap().label_id;
    assert_eq!(first_record.packaging_record.unwrap().unit_id, label_id);

    let second = manufacturing_assigned(&app, &cast).await;
    app.lifecycle
        .submit_manufacturing(&cast.m2, &second, manufacturing_submission())
        .await
        .unwrap();
    let err = app
        .lifecycle
        .complete_packaging(
            &cast.m2,
            &second,
            PackagingSubmission {
                unit_id: Some(label_id),
                ..packaging_submission()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        app.lifecycle.get_batch(&second).await.unwrap().status,
        BatchStatus::ManufacturingDone
    );
}

#[tokio::test]
async fn test_creation_anchor_failure_is_a_follow_up_and_can_be_retried() {
    let (app, cast) = harness().await;
    app.ledger.set_available(false);

    let report = app
        .lifecycle
        .create_batch(
            &cast.collector,
            herbtrace::batch::NewBatch {
                herb_name: HERB.to_string(),
                farm_location: "Mysuru".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(report.follow_ups.len(), 1);
    let follow_up = &report.follow_ups[0];
    assert_eq!(follow_up.step, FollowUpStep::Anchor(AnchorKind::Creation));
    assert_eq!(follow_up.error_kind, ErrorKind::CollaboratorFailure);
    assert!(follow_up.retryable);

    let batch_id = report.record.batch_id.clone();
    assert_eq!(report.record.status, BatchStatus::Planting);
    assert!(report.record.ledger_references.is_empty());

    let err = app
        .lifecycle
        .retry_anchor(&cast.admin, &batch_id, AnchorKind::Creation)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);

    app.ledger.set_available(true);
    let retried = app
        .lifecycle
        .retry_anchor(&cast.admin, &batch_id, AnchorKind::Creation)
        .await
        .unwrap()
        .into_record();
    assert!(retried.ledger_reference(AnchorKind::Creation).is_some());
    assert_eq!(retried.status, BatchStatus::Planting);

    let err = app
        .lifecycle
        .retry_anchor(&cast.admin, &batch_id, AnchorKind::Creation)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_retry_anchor_guards() {
    let (app, cast) = harness().await;
    let batch_id = new_batch(&app, &cast).await;

    let err = app
        .lifecycle
        .retry_anchor(&cast.collector, &batch_id, AnchorKind::Creation)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = app
        .lifecycle
        .retry_anchor(&cast.admin, &batch_id, AnchorKind::Final)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = app
        .lifecycle
        .retry_anchor(&cast.admin, &batch_id, AnchorKind::Packaging)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_upload_failure_leaves_record_unchanged() {
    let (app, cast) = harness().await;
    let batch_id = testing_assigned(&app, &cast).await;
    app.lifecycle
        .accept_test_task(cast.tester(), &batch_id)
        .await
        .unwrap();
    let before = app.lifecycle.get_batch(&batch_id).await.unwrap();

    app.blobs.set_available(false);
    let err = app
        .lifecycle
        .submit_lab_result(
            cast.tester(),
            &batch_id,
            LabReport {
                passed: true,
                remarks: None,
                report: Some(photo("report.pdf")),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
    assert_eq!(app.lifecycle.get_batch(&batch_id).await.unwrap(), before);

    app.blobs.set_available(true);
    let record = app
        .lifecycle
        .submit_lab_result(
            cast.tester(),
            &batch_id,
            LabReport {
                passed: true,
                remarks: None,
                report: Some(photo("report.pdf")),
            },
        )
        .await
        .unwrap()
        .into_record();
    assert_eq!(record.status, BatchStatus::BiddingOpen);
    assert_eq!(record.lab_result.unwrap().quality_score, 95);
}

#[tokio::test]
async fn test_species_mismatch_blocks_final_anchor() {
    let (app, cast) = harness_with(Arc::new(MemoryBatchStore::new()), 2, "Neem").await;
    let batch_id = packaged(&app, &cast).await;

    let err = app
        .lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(
        app.lifecycle.get_batch(&batch_id).await.unwrap().status,
        BatchStatus::Packaged
    );
}

#[tokio::test]
async fn test_species_names_must_match_whole_words() {
    let (app, cast) = harness_with(Arc::new(MemoryBatchStore::new()), 2, "Holy Tulsi Mix").await;
    let batch_id = packaged(&app, &cast).await;
    let before = app.lifecycle.get_batch(&batch_id).await.unwrap();

    let err = app
        .lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(app.lifecycle.get_batch(&batch_id).await.unwrap(), before);
    let unit_id = before.unit_id().unwrap();
    assert!(app
        .ledger
        .anchors_for(unit_id)
        .iter()
        .all(|(kind, _)| *kind != AnchorKind::Final));
}

#[tokio::test]
async fn test_qualified_classifier_label_matches_main_name() {
    let (app, cast) =
        harness_with(Arc::new(MemoryBatchStore::new()), 2, "Tulsi (Holy Basil)").await;
    let batch_id = packaged(&app, &cast).await;

    let report = app
        .lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap();
    assert_eq!(report.record.status, BatchStatus::BlockchainAnchored);
}

#[tokio::test]
async fn test_rejected_batch_cannot_anchor_even_with_mismatched_species() {
    let (app, cast) = harness_with(Arc::new(MemoryBatchStore::new()), 2, "Neem").await;
    let batch_id = lab_decided(&app, &cast, false).await;
    let before = app.lifecycle.get_batch(&batch_id).await.unwrap();

    let err = app
        .lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(app.lifecycle.get_batch(&batch_id).await.unwrap(), before);
}

#[tokio::test]
async fn test_final_anchor_with_ledger_offline_leaves_record_unchanged() {
    let (app, cast) = harness().await;
    let batch_id = packaged(&app, &cast).await;
    let before = app.lifecycle.get_batch(&batch_id).await.unwrap();

    app.ledger.set_available(false);
    let err = app
        .lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
    assert_eq!(app.lifecycle.get_batch(&batch_id).await.unwrap(), before);

    app.ledger.set_available(true);
    app.lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap();
    let err = app
        .lifecycle
        .anchor_final(&cast.collector, &batch_id, species_photo())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_open_tasks_follow_the_chain() {
    let (app, cast) = harness().await;
    let batch_id = testing_assigned(&app, &cast).await;

    let tester_tasks = app.lifecycle.open_tasks(cast.tester()).await.unwrap();
    assert_eq!(tester_tasks.len(), 1);
    assert_eq!(tester_tasks[0].batch_id, batch_id);
    assert!(app.lifecycle.open_tasks(&cast.m1).await.unwrap().is_empty());

    app.lifecycle
        .accept_test_task(cast.tester(), &batch_id)
        .await
        .unwrap();
    assert!(app
        .lifecycle
        .open_tasks(&cast.testers[1])
        .await
        .unwrap()
        .is_empty());

    let err = app
        .lifecycle
        .list_batches(&cast.collector, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let in_progress = app
        .lifecycle
        .list_batches(&cast.admin, Some(BatchStatus::TestingInProgress))
        .await
        .unwrap();
    assert_eq!(in_progress.len(), 1);
}

#[tokio::test]
async fn test_metrics_count_transitions_and_failures() {
    let (app, cast) = harness().await;
    let batch_id = testing_assigned(&app, &cast).await;
    let _ = app
        .lifecycle
        .publish_for_testing(&cast.admin, &batch_id)
        .await
        .unwrap_err();

    let stats = app.lifecycle.metrics().get_stats();
    assert_eq!(stats.transitions, 2);
    assert_eq!(stats.failures.get(&ErrorKind::InvalidState), Some(&1));
}
