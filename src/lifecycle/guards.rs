// Transition guards - one declarative table, one evaluation routine
//
// Evaluation order is fixed: role -> existence -> status -> actor scope -> preconditions.
// Existence is the store's job (the record is handed in); everything else lives here.

use std::fmt;

use crate::batch::{AnchorKind, BatchRecord, BatchStatus, GrowthStage};
use crate::error::LifecycleError;
use crate::identity::{ActorId, Identity, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateBatch,
    SubmitGrowthProof,
    AssignCollector,
    PublishForTesting,
    AcceptTestTask,
    SubmitLabResult,
    SubmitQuote,
    SelectManufacturer,
    SubmitManufacturing,
    CompletePackaging,
    AnchorFinal,
    RetryAnchor,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateBatch => "create_batch",
            Operation::SubmitGrowthProof => "submit_growth_proof",
            Operation::AssignCollector => "assign_collector",
            Operation::PublishForTesting => "publish_for_testing",
            Operation::AcceptTestTask => "accept_test_task",
            Operation::SubmitLabResult => "submit_lab_result",
            Operation::SubmitQuote => "submit_quote",
            Operation::SelectManufacturer => "select_manufacturer",
            Operation::SubmitManufacturing => "submit_manufacturing",
            Operation::CompletePackaging => "complete_packaging",
            Operation::AnchorFinal => "anchor_final",
            Operation::RetryAnchor => "retry_anchor",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Statuses an operation may start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPattern {
    /// No record yet (creation).
    Absent,
    /// Any status.
    Any,
    /// `planting`, `collection_assigned` or any `growing_stage_k`.
    Cultivation,
    Exactly(BatchStatus),
}

impl StatusPattern {
    pub fn matches(&self, status: BatchStatus) -> bool {
        match self {
            StatusPattern::Absent => false,
            StatusPattern::Any => true,
            StatusPattern::Cultivation => status.is_cultivation(),
            StatusPattern::Exactly(expected) => status == *expected,
        }
    }

    /// The single status a conditional write can pin, when there is one.
    pub fn pinned(&self) -> Option<BatchStatus> {
        match self {
            StatusPattern::Exactly(status) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for StatusPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPattern::Absent => f.write_str("no existing record"),
            StatusPattern::Any => f.write_str("any status"),
            StatusPattern::Cultivation => {
                f.write_str("planting, collection_assigned or growing_stage_k")
            }
            StatusPattern::Exactly(status) => write!(f, "{status}"),
        }
    }
}

/// Which actor, beyond holding the role, may perform the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorScope {
    AnyWithRole,
    /// The assigned collector when there is one, otherwise the batch creator.
    Cultivator,
    AssignedTester,
    AssignedManufacturer,
}

/// Checks that only make sense once role, status and actor are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    CollectorUnassigned,
    GrowthStageIsNew,
    LabResultPending,
    NoQuoteFromCaller,
    QuoteOnFile,
    ManufacturerUnassigned,
    ManufacturingPending,
    PackagingPending,
    LabPassed,
    FinalAnchorPending,
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub operation: Operation,
    pub role: Role,
    pub from: StatusPattern,
    pub scope: ActorScope,
    pub preconditions: &'static [Precondition],
}

pub const TRANSITION_RULES: &[TransitionRule] = &[
    TransitionRule {
        operation: Operation::CreateBatch,
        role: Role::Collector,
        from: StatusPattern::Absent,
        scope: ActorScope::AnyWithRole,
        preconditions: &[],
    },
    TransitionRule {
        operation: Operation::SubmitGrowthProof,
        role: Role::Collector,
        from: StatusPattern::Cultivation,
        scope: ActorScope::Cultivator,
        preconditions: &[Precondition::GrowthStageIsNew],
    },
    TransitionRule {
        operation: Operation::AssignCollector,
        role: Role::Admin,
        from: StatusPattern::Cultivation,
        scope: ActorScope::AnyWithRole,
        preconditions: &[Precondition::CollectorUnassigned],
    },
    TransitionRule {
        operation: Operation::PublishForTesting,
        role: Role::Admin,
        from: StatusPattern::Cultivation,
        scope: ActorScope::AnyWithRole,
        preconditions: &[],
    },
    TransitionRule {
        operation: Operation::AcceptTestTask,
        role: Role::Tester,
        from: StatusPattern::Exactly(BatchStatus::TestingAssigned),
        scope: ActorScope::AnyWithRole,
        preconditions: &[],
    },
    TransitionRule {
        operation: Operation::SubmitLabResult,
        role: Role::Tester,
        from: StatusPattern::Exactly(BatchStatus::TestingInProgress),
        scope: ActorScope::AssignedTester,
        preconditions: &[Precondition::LabResultPending],
    },
    TransitionRule {
        operation: Operation::SubmitQuote,
        role: Role::Manufacturer,
        from: StatusPattern::Exactly(BatchStatus::BiddingOpen),
        scope: ActorScope::AnyWithRole,
        preconditions: &[Precondition::NoQuoteFromCaller],
    },
    TransitionRule {
        operation: Operation::SelectManufacturer,
        role: Role::Admin,
        from: StatusPattern::Exactly(BatchStatus::BiddingOpen),
        scope: ActorScope::AnyWithRole,
        preconditions: &[Precondition::ManufacturerUnassigned, Precondition::QuoteOnFile],
    },
    TransitionRule {
        operation: Operation::SubmitManufacturing,
        role: Role::Manufacturer,
        from: StatusPattern::Exactly(BatchStatus::ManufacturingAssigned),
        scope: ActorScope::AssignedManufacturer,
        preconditions: &[Precondition::ManufacturingPending],
    },
    TransitionRule {
        operation: Operation::CompletePackaging,
        role: Role::Manufacturer,
        from: StatusPattern::Exactly(BatchStatus::ManufacturingDone),
        scope: ActorScope::AssignedManufacturer,
        preconditions: &[Precondition::PackagingPending],
    },
    TransitionRule {
        operation: Operation::AnchorFinal,
        role: Role::Collector,
        from: StatusPattern::Exactly(BatchStatus::Packaged),
        scope: ActorScope::Cultivator,
        preconditions: &[Precondition::LabPassed, Precondition::FinalAnchorPending],
    },
    TransitionRule {
        operation: Operation::RetryAnchor,
        role: Role::Admin,
        from: StatusPattern::Any,
        scope: ActorScope::AnyWithRole,
        preconditions: &[],
    },
];

/// Operation-specific inputs some preconditions need.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardInput<'a> {
    pub stage: Option<GrowthStage>,
    pub selected_manufacturer: Option<&'a str>,
}

/// Rules are listed in `Operation` declaration order.
pub fn rule_for(operation: Operation) -> &'static TransitionRule {
    &TRANSITION_RULES[operation as usize]
}

/// Role check, evaluated before the record is loaded.
pub fn authorize_role(operation: Operation, caller: &Identity) -> Result<(), LifecycleError> {
    let rule = rule_for(operation);
    if caller.role != rule.role {
        return Err(LifecycleError::forbidden(format!(
            "{operation} requires role {}, caller {} has role {}",
            rule.role, caller.actor_id, caller.role
        )));
    }
    Ok(())
}

/// The error reported when a record's status does not allow `operation`.
pub fn status_rejection(operation: Operation, actual: BatchStatus) -> LifecycleError {
    let rule = rule_for(operation);
    LifecycleError::invalid_state(
        operation.name(),
        format!("batch is {actual}, expected {}", rule.from),
    )
}

/// Status, actor scope and preconditions against a loaded record.
///
/// Runs once on a snapshot before any collaborator call and again inside the
/// store's critical section, so the committed write never relies on stale checks.
pub fn check(
    operation: Operation,
    caller: &Identity,
    input: &GuardInput<'_>,
    record: &BatchRecord,
) -> Result<(), LifecycleError> {
    let rule = rule_for(operation);

    if !rule.from.matches(record.status) {
        return Err(status_rejection(operation, record.status));
    }

    check_scope(operation, rule.scope, caller, record)?;

    for precondition in rule.preconditions {
        check_precondition(operation, *precondition, caller, input, record)?;
    }
    Ok(())
}

/// The actor a cultivation step belongs to.
pub fn cultivator_of(record: &BatchRecord) -> &ActorId {
    record
        .collector_assignment
        .as_ref()
        .map(|a| &a.actor_id)
        .unwrap_or(&record.created_by.actor_id)
}

fn check_scope(
    operation: Operation,
    scope: ActorScope,
    caller: &Identity,
    record: &BatchRecord,
) -> Result<(), LifecycleError> {
    let (owner, what) = match scope {
        ActorScope::AnyWithRole => return Ok(()),
        ActorScope::Cultivator => (Some(cultivator_of(record)), "collector"),
        ActorScope::AssignedTester => (
            record.lab_assignment.as_ref().map(|a| &a.tester_id),
            "tester",
        ),
        ActorScope::AssignedManufacturer => (
            record
                .manufacturer_assignment
                .as_ref()
                .map(|a| &a.manufacturer_id),
            "manufacturer",
        ),
    };

    match owner {
        None => Err(LifecycleError::invalid_state(
            operation.name(),
            format!("batch {} has no assigned {what}", record.batch_id),
        )),
        Some(owner) if *owner != caller.actor_id => Err(LifecycleError::forbidden(format!(
            "{} is not the {what} assigned to batch {}",
            caller.actor_id, record.batch_id
        ))),
        Some(_) => Ok(()),
    }
}

fn check_precondition(
    operation: Operation,
    precondition: Precondition,
    caller: &Identity,
    input: &GuardInput<'_>,
    record: &BatchRecord,
) -> Result<(), LifecycleError> {
    let batch_id = &record.batch_id;
    match precondition {
        Precondition::CollectorUnassigned => {
            if let Some(existing) = &record.collector_assignment {
                return Err(LifecycleError::conflict(format!(
                    "batch {batch_id} already has collector {}",
                    existing.actor_id
                )));
            }
        }
        Precondition::GrowthStageIsNew => {
            let stage = input.stage.ok_or_else(|| {
                LifecycleError::invalid_input("growth stage is required")
            })?;
            if record.growth_records.contains_key(&stage) {
                return Err(LifecycleError::conflict(format!(
                    "growth stage {stage} already recorded for batch {batch_id}"
                )));
            }
            if let Some(latest) = record.latest_growth_stage() {
                if stage < latest {
                    return Err(LifecycleError::invalid_state(
                        operation.name(),
                        format!("stage {stage} is behind the latest recorded stage {latest}"),
                    ));
                }
            }
        }
        Precondition::LabResultPending => {
            if record.lab_result.is_some() {
                return Err(LifecycleError::conflict(format!(
                    "lab result already submitted for batch {batch_id}"
                )));
            }
        }
        Precondition::NoQuoteFromCaller => {
            if record.quote_from(&caller.actor_id).is_some() {
                return Err(LifecycleError::conflict(format!(
                    "{} already quoted for batch {batch_id}",
                    caller.actor_id
                )));
            }
        }
        Precondition::QuoteOnFile => {
            let selected = input.selected_manufacturer.ok_or_else(|| {
                LifecycleError::invalid_input("manufacturer id is required")
            })?;
            if record.quote_from(selected).is_none() {
                return Err(LifecycleError::invalid_state(
                    operation.name(),
                    format!("{selected} has no quote on file for batch {batch_id}"),
                ));
            }
        }
        Precondition::ManufacturerUnassigned => {
            if let Some(existing) = &record.manufacturer_assignment {
                return Err(LifecycleError::conflict(format!(
                    "batch {batch_id} is already assigned to {}",
                    existing.manufacturer_id
                )));
            }
        }
        Precondition::ManufacturingPending => {
            if record.manufacturing_record.is_some() {
                return Err(LifecycleError::conflict(format!(
                    "manufacturing already recorded for batch {batch_id}"
                )));
            }
        }
        Precondition::PackagingPending => {
            if record.packaging_record.is_some() {
                return Err(LifecycleError::conflict(format!(
                    "packaging already recorded for batch {batch_id}"
                )));
            }
        }
        Precondition::LabPassed => {
            if !record.lab_passed() {
                return Err(LifecycleError::invalid_state(
                    operation.name(),
                    format!("batch {batch_id} has no passing lab result"),
                ));
            }
        }
        Precondition::FinalAnchorPending => {
            if record.ledger_reference(AnchorKind::Final).is_some() {
                return Err(LifecycleError::conflict(format!(
                    "batch {batch_id} already has a final anchor"
                )));
            }
        }
    }
    Ok(())
}
