//! Lifecycle events and the notification each one produces

use rust_decimal::Decimal;

use super::types::{Category, Dispatch};
use crate::batch::BatchId;
use crate::identity::{ActorId, Role};

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    BatchCreated {
        batch_id: BatchId,
        herb_name: String,
    },
    CollectorAssigned {
        batch_id: BatchId,
        collector_id: ActorId,
    },
    TestingPublished {
        batch_id: BatchId,
    },
    TestAccepted {
        batch_id: BatchId,
        tester_name: String,
    },
    BiddingOpened {
        batch_id: BatchId,
    },
    BatchRejected {
        batch_id: BatchId,
        collector_id: ActorId,
    },
    QuoteReceived {
        batch_id: BatchId,
        manufacturer_name: String,
        price: Decimal,
    },
    ManufacturerSelected {
        batch_id: BatchId,
        manufacturer_id: ActorId,
    },
    ManufacturingCompleted {
        batch_id: BatchId,
    },
    Packaged {
        batch_id: BatchId,
        collector_id: ActorId,
        unit_id: String,
    },
    FinalAnchored {
        batch_id: BatchId,
        transaction_id: String,
    },
}

impl LifecycleEvent {
    pub fn into_dispatch(self) -> Dispatch {
        match self {
            LifecycleEvent::BatchCreated { batch_id, herb_name } => Dispatch::to_role(
                Role::Admin,
                Category::System,
                "New Batch Created",
                format!("Batch {batch_id} ({herb_name}) has been registered"),
            )
            .for_batch(batch_id),
            LifecycleEvent::CollectorAssigned {
                batch_id,
                collector_id,
            } => Dispatch::to_actor(
                collector_id,
                Role::Collector,
                Category::Assignment,
                "New Collection Assigned",
                format!("You have been assigned to batch {batch_id}"),
            )
            .for_batch(batch_id),
            LifecycleEvent::TestingPublished { batch_id } => Dispatch::to_role(
                Role::Tester,
                Category::Lab,
                "New Lab Test Available",
                format!(
                    "Batch {batch_id} is available for testing. First to accept will be assigned."
                ),
            )
            .for_batch(batch_id),
            LifecycleEvent::TestAccepted {
                batch_id,
                tester_name,
            } => Dispatch::to_role(
                Role::Admin,
                Category::Lab,
                "Lab Test Accepted",
                format!("{tester_name} accepted the lab test for batch {batch_id}"),
            )
            .for_batch(batch_id),
            LifecycleEvent::BiddingOpened { batch_id } => Dispatch::to_role(
                Role::Manufacturer,
                Category::Bidding,
                "New Batch Open For Bidding",
                format!("Batch {batch_id} passed lab testing and is open for quotes"),
            )
            .for_batch(batch_id),
            LifecycleEvent::BatchRejected {
                batch_id,
                collector_id,
            } => Dispatch::to_actor(
                collector_id,
                Role::Collector,
                Category::Lab,
                "Batch Rejected",
                format!("Batch {batch_id} failed lab testing"),
            )
            .for_batch(batch_id),
            LifecycleEvent::QuoteReceived {
                batch_id,
                manufacturer_name,
                price,
            } => Dispatch::to_role(
                Role::Admin,
                Category::Bidding,
                "New Quote Received",
                format!("{manufacturer_name} quoted {price} for batch {batch_id}"),
            )
            .for_batch(batch_id),
            LifecycleEvent::ManufacturerSelected {
                batch_id,
                manufacturer_id,
            } => Dispatch::to_actor(
                manufacturer_id,
                Role::Manufacturer,
                Category::Manufacturing,
                "Manufacturing Assigned",
                format!("You have been selected to manufacture batch {batch_id}"),
            )
            .for_batch(batch_id),
            LifecycleEvent::ManufacturingCompleted { batch_id } => Dispatch::to_role(
                Role::Admin,
                Category::Manufacturing,
                "Manufacturing Completed",
                format!("Manufacturing for batch {batch_id} is complete"),
            )
            .for_batch(batch_id),
            LifecycleEvent::Packaged {
                batch_id,
                collector_id,
                unit_id,
            } => Dispatch::to_actor(
                collector_id,
                Role::Collector,
                Category::Ledger,
                "Ready For Final Anchoring",
                format!("Batch {batch_id} was packaged as {unit_id} and awaits final anchoring"),
            )
            .for_batch(batch_id),
            LifecycleEvent::FinalAnchored {
                batch_id,
                transaction_id,
            } => Dispatch::to_role(
                Role::Admin,
                Category::Ledger,
                "Batch Anchored",
                format!("Batch {batch_id} was anchored in transaction {transaction_id}"),
            )
            .for_batch(batch_id),
        }
    }
}
