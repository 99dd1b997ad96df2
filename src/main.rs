use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use herbtrace::batch::{
    AssignCollector, Evidence, FinalAnchorRequest, GeoPoint, GrowthProof, LabReport,
    ManufacturerSelection, ManufacturingSubmission, NewBatch, PackagingSubmission,
    QuoteSubmission,
};
use herbtrace::{config, init_telemetry, shutdown_telemetry, HerbTrace, HerbTraceConfig, Identity};

#[derive(Parser)]
#[command(name = "herbtrace")]
#[command(about = "Custody-chain lifecycle engine for herb batches")]
#[command(long_about = "HerbTrace moves herb batches from planting through lab testing, \
                       manufacturer bidding and packaging to a final ledger anchor, with \
                       guarded transitions and first-claim-wins lab tasks.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole custody chain in memory and print the public provenance as JSON
    Demo {
        /// Herb name recorded on the batch
        #[arg(long, default_value = "Tulsi")]
        herb: String,
        /// Label the species classifier answers with (defaults to the herb name)
        #[arg(long)]
        species: Option<String>,
        /// Fail the lab test instead of passing it
        #[arg(long)]
        fail_lab: bool,
    },
    /// Race several testers for one published lab task and print the winner
    Race {
        /// Number of competing testers
        #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=256))]
        testers: u32,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config()?;
    init_telemetry(&config.observability)?;

    let result = match cli.command {
        Commands::Demo {
            herb,
            species,
            fail_lab,
        } => tokio::runtime::Runtime::new()?.block_on(async {
            demo_command(config, &herb, species.as_deref().unwrap_or(&herb), fail_lab).await
        }),
        Commands::Race { testers } => {
            tokio::runtime::Runtime::new()?.block_on(async { race_command(config, testers).await })
        }
        Commands::Config { save } => config_command(config, save),
    };

    shutdown_telemetry();
    result
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn config_command(config: &HerbTraceConfig, save: Option<PathBuf>) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if let Some(path) = save {
        config
            .save_to_file(&path)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        eprintln!("Configuration saved to {}", path.display());
    }
    Ok(())
}

async fn register_cast(app: &HerbTrace, cast: &[Identity]) -> Result<()> {
    for identity in cast {
        app.directory.register(identity.clone()).await?;
    }
    Ok(())
}

#[derive(Serialize)]
struct DemoOutcome {
    batch_id: String,
    final_status: String,
    follow_ups: usize,
    provenance: herbtrace::PublicProvenance,
}

async fn demo_command(config: &HerbTraceConfig, herb: &str, species: &str, fail_lab: bool) -> Result<()> {
    let app = HerbTrace::from_config(config, species).await?;
    let admin = Identity::admin(&config.admin.actor_id, &config.admin.display_name);
    let collector = Identity::collector("collector-1", "Ravi Kumar");
    let tester = Identity::tester("tester-1", "Ayush Labs");
    let rival_tester = Identity::tester("tester-2", "Herbal QA");
    let bidder = Identity::manufacturer("manufacturer-1", "Green Pharma");
    let winner = Identity::manufacturer("manufacturer-2", "Vedic Works");
    register_cast(
        &app,
        &[
            collector.clone(),
            tester.clone(),
            rival_tester.clone(),
            bidder.clone(),
            winner.clone(),
        ],
    )
    .await?;

    let lifecycle = &app.lifecycle;
    let mut follow_ups = 0;

    let created = lifecycle
        .create_batch(
            &collector,
            NewBatch {
                herb_name: herb.to_string(),
                farm_location: "Mysuru, Karnataka".to_string(),
            },
        )
        .await?;
    follow_ups += created.follow_ups.len();
    let batch_id = created.record.batch_id.clone();

    lifecycle
        .assign_collector(
            &admin,
            &batch_id,
            AssignCollector {
                collector_id: collector.actor_id.clone(),
                collector_name: collector.display_name.clone(),
                visit_date: None,
            },
        )
        .await?;

    for stage in 1..=3u8 {
        lifecycle
            .submit_growth_proof(
                &collector,
                &batch_id,
                GrowthProof {
                    stage,
                    notes: format!("Stage {stage} field visit"),
                    photo: Some(Evidence::new(format!("stage-{stage}.jpg"), vec![stage; 32])),
                    gps: Some(GeoPoint {
                        latitude: 12.2958,
                        longitude: 76.6394,
                    }),
                },
            )
            .await?;
    }

    lifecycle.publish_for_testing(&admin, &batch_id).await?;
    lifecycle.accept_test_task(&tester, &batch_id).await?;
    if let Err(error) = lifecycle.accept_test_task(&rival_tester, &batch_id).await {
        tracing::info!(error = %error, "Second tester lost the claim as expected");
    }

    let lab = lifecycle
        .submit_lab_result(
            &tester,
            &batch_id,
            LabReport {
                passed: !fail_lab,
                remarks: Some("Heavy metals within limits".to_string()),
                report: Some(Evidence::new("lab-report.pdf", b"%PDF-1.4 lab report".to_vec())),
            },
        )
        .await?;
    follow_ups += lab.follow_ups.len();

    if !fail_lab {
        for (manufacturer, price) in [(&bidder, 100), (&winner, 90)] {
            lifecycle
                .submit_quote(
                    manufacturer,
                    &batch_id,
                    QuoteSubmission {
                        price: Decimal::from(price),
                    },
                )
                .await?;
        }
        lifecycle
            .select_manufacturer(
                &admin,
                &batch_id,
                ManufacturerSelection {
                    manufacturer_id: winner.actor_id.clone(),
                },
            )
            .await?;
        lifecycle
            .submit_manufacturing(
                &winner,
                &batch_id,
                ManufacturingSubmission {
                    received_quantity_kg: Decimal::from(50),
                    process_steps: vec![
                        "washing".to_string(),
                        "shade drying".to_string(),
                        "grinding".to_string(),
                    ],
                    final_quantity_kg: Decimal::from(42),
                    product_form: "powder".to_string(),
                    storage_conditions: Some("cool and dry".to_string()),
                    certificate: Some(Evidence::new("gmp.pdf", b"%PDF-1.4 gmp".to_vec())),
                },
            )
            .await?;
        let packaged = lifecycle
            .complete_packaging(
                &winner,
                &batch_id,
                PackagingSubmission {
                    unit_id: None,
                    packaging_batch_number: "PKG-0001".to_string(),
                    barcode: None,
                },
            )
            .await?;
        follow_ups += packaged.follow_ups.len();

        let anchored = lifecycle
            .anchor_final(
                &collector,
                &batch_id,
                FinalAnchorRequest {
                    species_photo: Evidence::new("final.jpg", vec![7u8; 64]),
                },
            )
            .await?;
        follow_ups += anchored.follow_ups.len();
    }

    let record = lifecycle.get_batch(&batch_id).await?;
    let public_id = record.unit_id().unwrap_or(&batch_id).to_string();
    let provenance = app.projector.project(&public_id).await?;
    lifecycle.metrics().log_stats();

    print_json(&DemoOutcome {
        batch_id,
        final_status: record.status.to_string(),
        follow_ups,
        provenance,
    })
}

#[derive(Serialize)]
struct RaceOutcome {
    batch_id: String,
    testers: u32,
    winner: Option<String>,
    conflicts: usize,
    other_failures: Vec<String>,
}

async fn race_command(config: &HerbTraceConfig, testers: u32) -> Result<()> {
    let app = Arc::new(HerbTrace::from_config(config, "Tulsi").await?);
    let admin = Identity::admin(&config.admin.actor_id, &config.admin.display_name);
    let collector = Identity::collector("collector-1", "Ravi Kumar");
    app.directory.register(collector.clone()).await?;

    let contenders: Vec<Identity> = (1..=testers)
        .map(|i| Identity::tester(&format!("tester-{i}"), &format!("Lab {i}")))
        .collect();
    register_cast(&app, &contenders).await?;

    let batch_id = app
        .lifecycle
        .create_batch(
            &collector,
            NewBatch {
                herb_name: "Tulsi".to_string(),
                farm_location: "Mysuru".to_string(),
            },
        )
        .await?
        .record
        .batch_id;
    app.lifecycle.publish_for_testing(&admin, &batch_id).await?;

    let handles: Vec<_> = contenders
        .into_iter()
        .map(|tester| {
            let app = app.clone();
            let batch_id = batch_id.clone();
            tokio::spawn(async move {
                let outcome = app.lifecycle.accept_test_task(&tester, &batch_id).await;
                (tester.actor_id, outcome)
            })
        })
        .collect();

    let mut winner = None;
    let mut conflicts = 0;
    let mut other_failures = Vec::new();
    for handle in handles {
        let (tester_id, outcome) = handle.await?;
        match outcome {
            Ok(_) => winner = Some(tester_id),
            Err(herbtrace::LifecycleError::Conflict { .. }) => conflicts += 1,
            Err(error) => other_failures.push(format!("{tester_id}: {error}")),
        }
    }

    print_json(&RaceOutcome {
        batch_id,
        testers,
        winner,
        conflicts,
        other_failures,
    })
}
