use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::status::{BatchStatus, GrowthStage};
use crate::external::{ContentId, TransactionId};
use crate::identity::{ActorId, ActorRef};

pub type BatchId = String;

pub fn new_batch_id() -> BatchId {
    format!("BATCH-{}", uuid::Uuid::new_v4().simple())
}

/// The central custody record. Only the lifecycle engine mutates it, and only through
/// the batch store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchRecord {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub herb_name: String,
    pub farm_location: String,
    pub created_at: DateTime<Utc>,
    pub created_by: ActorRef,
    pub collector_assignment: Option<CollectorAssignment>,
    #[serde(default)]
    pub growth_records: BTreeMap<GrowthStage, GrowthRecord>,
    pub testing_published_at: Option<DateTime<Utc>>,
    pub lab_assignment: Option<LabAssignment>,
    pub lab_result: Option<LabResult>,
    #[serde(default)]
    pub quotes: Vec<Quote>,
    pub manufacturer_assignment: Option<ManufacturerAssignment>,
    pub manufacturing_record: Option<ManufacturingRecord>,
    pub packaging_record: Option<PackagingRecord>,
    #[serde(default)]
    pub ledger_references: Vec<LedgerReference>,
    /// Write counter maintained by the store; bumped on every successful update.
    #[serde(default)]
    pub version: u64,
}

impl BatchRecord {
    pub fn new(
        batch_id: BatchId,
        herb_name: String,
        farm_location: String,
        created_by: ActorRef,
    ) -> Self {
        Self {
            batch_id,
            status: BatchStatus::Planting,
            herb_name,
            farm_location,
            created_at: Utc::now(),
            created_by,
            collector_assignment: None,
            growth_records: BTreeMap::new(),
            testing_published_at: None,
            lab_assignment: None,
            lab_result: None,
            quotes: Vec::new(),
            manufacturer_assignment: None,
            manufacturing_record: None,
            packaging_record: None,
            ledger_references: Vec::new(),
            version: 0,
        }
    }

    pub fn latest_growth_stage(&self) -> Option<GrowthStage> {
        self.growth_records.keys().next_back().copied()
    }

    pub fn quote_from(&self, manufacturer_id: &str) -> Option<&Quote> {
        self.quotes
            .iter()
            .find(|quote| quote.manufacturer_id == manufacturer_id)
    }

    pub fn ledger_reference(&self, kind: AnchorKind) -> Option<&LedgerReference> {
        self.ledger_references.iter().find(|r| r.kind == kind)
    }

    /// The identifier printed on the product: packaging unit id, else the label id.
    pub fn unit_id(&self) -> Option<&str> {
        self.packaging_record
            .as_ref()
            .map(|p| p.unit_id.as_str())
            .or_else(|| {
                self.manufacturer_assignment
                    .as_ref()
                    .map(|m| m.label_id.as_str())
            })
    }

    pub fn lab_passed(&self) -> bool {
        self.lab_result.as_ref().is_some_and(|r| r.passed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorAssignment {
    pub actor_id: ActorId,
    pub actor_name: String,
    pub visit_date: Option<NaiveDate>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrowthRecord {
    /// `None` when the collector supplied no photo.
    pub content_id: Option<ContentId>,
    pub notes: String,
    pub gps: Option<GeoPoint>,
    pub address: Option<String>,
    pub recorded_by: ActorId,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabAssignment {
    pub tester_id: ActorId,
    pub tester_name: String,
    pub accepted_at: DateTime<Utc>,
}

pub const PASSING_QUALITY_SCORE: u8 = 95;
pub const FAILING_QUALITY_SCORE: u8 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabResult {
    pub passed: bool,
    pub report_content_id: Option<ContentId>,
    pub quality_score: u8,
    pub remarks: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Quote {
    pub quote_id: String,
    pub manufacturer_id: ActorId,
    pub manufacturer_name: String,
    pub price: Decimal,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManufacturerAssignment {
    pub manufacturer_id: ActorId,
    pub manufacturer_name: String,
    pub price: Decimal,
    pub label_id: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManufacturingRecord {
    pub received_quantity_kg: Decimal,
    pub process_steps: Vec<String>,
    pub final_quantity_kg: Decimal,
    pub product_form: String,
    pub storage_conditions: Option<String>,
    pub certificate_content_id: Option<ContentId>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagingRecord {
    pub unit_id: String,
    pub packaging_batch_number: String,
    pub barcode: Option<String>,
    pub packaged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    Creation,
    Packaging,
    Final,
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnchorKind::Creation => "creation",
            AnchorKind::Packaging => "packaging",
            AnchorKind::Final => "final",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerReference {
    pub kind: AnchorKind,
    pub transaction_id: TransactionId,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BatchRecord {
        BatchRecord::new(
            "B1".to_string(),
            "Ashwagandha".to_string(),
            "12.9716,77.5946".to_string(),
            ActorRef {
                actor_id: "C-1".to_string(),
                actor_name: "Ravi".to_string(),
            },
        )
    }

    #[test]
    fn test_new_record_starts_planting_with_nothing_attached() {
        let record = sample();
        assert_eq!(record.status, BatchStatus::Planting);
        assert!(record.quotes.is_empty());
        assert!(record.latest_growth_stage().is_none());
        assert!(record.unit_id().is_none());
        assert!(!record.lab_passed());
    }

    #[test]
    fn test_unit_id_prefers_packaging_over_label() {
        let mut record = sample();
        record.manufacturer_assignment = Some(ManufacturerAssignment {
            manufacturer_id: "M-1".to_string(),
            manufacturer_name: "Herbal Works".to_string(),
            price: Decimal::from(90),
            label_id: "LBL-B1-1234".to_string(),
            assigned_at: Utc::now(),
        });
        assert_eq!(record.unit_id(), Some("LBL-B1-1234"));

        record.packaging_record = Some(PackagingRecord {
            unit_id: "UNIT-77".to_string(),
            packaging_batch_number: "PK-1".to_string(),
            barcode: None,
            packaged_at: Utc::now(),
        });
        assert_eq!(record.unit_id(), Some("UNIT-77"));
    }

    #[test]
    fn test_record_survives_json_and_rejects_extra_fields() {
        let record = sample();
        let mut value = serde_json::to_value(&record).unwrap();
        let decoded: BatchRecord = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(decoded, record);

        value["owner_notes"] = serde_json::json!("free-form");
        assert!(serde_json::from_value::<BatchRecord>(value).is_err());
    }

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint { latitude: 12.9, longitude: 77.5 }.is_valid());
        assert!(!GeoPoint { latitude: 91.0, longitude: 0.0 }.is_valid());
        assert!(!GeoPoint { latitude: 0.0, longitude: -181.0 }.is_valid());
    }
}
