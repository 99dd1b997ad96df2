use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LifecycleError;

pub const MAX_GROWTH_STAGE: u8 = 5;

/// A cultivation stage number in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GrowthStage(u8);

impl GrowthStage {
    pub fn new(stage: u8) -> Result<Self, LifecycleError> {
        if (1..=MAX_GROWTH_STAGE).contains(&stage) {
            Ok(Self(stage))
        } else {
            Err(LifecycleError::invalid_input(format!(
                "growth stage must be between 1 and {MAX_GROWTH_STAGE}, got {stage}"
            )))
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for GrowthStage {
    type Error = LifecycleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        GrowthStage::new(value)
    }
}

impl From<GrowthStage> for u8 {
    fn from(stage: GrowthStage) -> Self {
        stage.0
    }
}

impl fmt::Display for GrowthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Batch status. Serialized as the snake_case names used on the wire
/// (`planting`, `growing_stage_3`, `bidding_open`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BatchStatus {
    Planting,
    CollectionAssigned,
    GrowingStage(GrowthStage),
    TestingAssigned,
    TestingInProgress,
    BiddingOpen,
    Rejected,
    ManufacturingAssigned,
    ManufacturingDone,
    Packaged,
    BlockchainAnchored,
}

impl BatchStatus {
    /// Coarse position in the custody chain. No legal transition lowers it.
    pub fn phase(&self) -> u8 {
        match self {
            BatchStatus::Planting => 0,
            BatchStatus::CollectionAssigned | BatchStatus::GrowingStage(_) => 1,
            BatchStatus::TestingAssigned => 2,
            BatchStatus::TestingInProgress => 3,
            BatchStatus::BiddingOpen | BatchStatus::Rejected => 4,
            BatchStatus::ManufacturingAssigned => 5,
            BatchStatus::ManufacturingDone => 6,
            BatchStatus::Packaged => 7,
            BatchStatus::BlockchainAnchored => 8,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Rejected | BatchStatus::BlockchainAnchored)
    }

    /// Still in the field: planting, collection assigned or a growth stage.
    pub fn is_cultivation(&self) -> bool {
        self.phase() <= 1
    }

    pub fn as_string(&self) -> String {
        match self {
            BatchStatus::Planting => "planting".to_string(),
            BatchStatus::CollectionAssigned => "collection_assigned".to_string(),
            BatchStatus::GrowingStage(stage) => format!("growing_stage_{stage}"),
            BatchStatus::TestingAssigned => "testing_assigned".to_string(),
            BatchStatus::TestingInProgress => "testing_in_progress".to_string(),
            BatchStatus::BiddingOpen => "bidding_open".to_string(),
            BatchStatus::Rejected => "rejected".to_string(),
            BatchStatus::ManufacturingAssigned => "manufacturing_assigned".to_string(),
            BatchStatus::ManufacturingDone => "manufacturing_done".to_string(),
            BatchStatus::Packaged => "packaged".to_string(),
            BatchStatus::BlockchainAnchored => "blockchain_anchored".to_string(),
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FromStr for BatchStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "planting" => BatchStatus::Planting,
            "collection_assigned" => BatchStatus::CollectionAssigned,
            "testing_assigned" => BatchStatus::TestingAssigned,
            "testing_in_progress" => BatchStatus::TestingInProgress,
            "bidding_open" => BatchStatus::BiddingOpen,
            "rejected" => BatchStatus::Rejected,
            "manufacturing_assigned" => BatchStatus::ManufacturingAssigned,
            "manufacturing_done" => BatchStatus::ManufacturingDone,
            "packaged" => BatchStatus::Packaged,
            "blockchain_anchored" => BatchStatus::BlockchainAnchored,
            other => {
                let stage = other
                    .strip_prefix("growing_stage_")
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or_else(|| {
                        LifecycleError::invalid_input(format!("unknown batch status '{other}'"))
                    })?;
                BatchStatus::GrowingStage(GrowthStage::new(stage)?)
            }
        };
        Ok(status)
    }
}

impl TryFrom<String> for BatchStatus {
    type Error = LifecycleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BatchStatus> for String {
    fn from(status: BatchStatus) -> Self {
        status.as_string()
    }
}
