// Command payloads accepted by lifecycle operations.
// Unknown fields are rejected at deserialization time.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::record::GeoPoint;
use crate::error::LifecycleError;
use crate::identity::ActorId;

/// Binary evidence (photo, report, certificate) to be handed to the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Evidence {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Evidence {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewBatch {
    pub herb_name: String,
    pub farm_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignCollector {
    pub collector_id: ActorId,
    pub collector_name: String,
    pub visit_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrowthProof {
    pub stage: u8,
    pub notes: String,
    pub photo: Option<Evidence>,
    pub gps: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabReport {
    pub passed: bool,
    pub remarks: Option<String>,
    pub report: Option<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteSubmission {
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManufacturerSelection {
    pub manufacturer_id: ActorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManufacturingSubmission {
    pub received_quantity_kg: Decimal,
    pub process_steps: Vec<String>,
    pub final_quantity_kg: Decimal,
    pub product_form: String,
    pub storage_conditions: Option<String>,
    pub certificate: Option<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagingSubmission {
    /// Defaults to the label id generated at manufacturer selection.
    pub unit_id: Option<String>,
    pub packaging_batch_number: String,
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinalAnchorRequest {
    /// Photo of the packaged herb, fed to the species classifier.
    pub species_photo: Evidence,
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), LifecycleError> {
    if value.trim().is_empty() {
        return Err(LifecycleError::invalid_input(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

impl NewBatch {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        require_text("herb_name", &self.herb_name)?;
        require_text("farm_location", &self.farm_location)
    }
}

impl AssignCollector {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        require_text("collector_id", &self.collector_id)?;
        require_text("collector_name", &self.collector_name)
    }
}

impl GrowthProof {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if let Some(gps) = &self.gps {
            if !gps.is_valid() {
                return Err(LifecycleError::invalid_input(format!(
                    "gps coordinates out of range: {gps}"
                )));
            }
        }
        Ok(())
    }
}

impl QuoteSubmission {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.price <= Decimal::ZERO {
            return Err(LifecycleError::invalid_input(format!(
                "quote price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

impl ManufacturingSubmission {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        require_text("product_form", &self.product_form)?;
        if self.received_quantity_kg <= Decimal::ZERO || self.final_quantity_kg <= Decimal::ZERO {
            return Err(LifecycleError::invalid_input(
                "quantities must be positive",
            ));
        }
        if self.final_quantity_kg > self.received_quantity_kg {
            return Err(LifecycleError::invalid_input(format!(
                "final quantity {} exceeds received quantity {}",
                self.final_quantity_kg, self.received_quantity_kg
            )));
        }
        Ok(())
    }
}

impl PackagingSubmission {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        require_text("packaging_batch_number", &self.packaging_batch_number)?;
        if let Some(unit_id) = &self.unit_id {
            require_text("unit_id", unit_id)?;
        }
        Ok(())
    }
}
