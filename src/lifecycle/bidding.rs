// Bidding: quote submission, manufacturer selection and label generation

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

use super::guards::{self, GuardInput, Operation};
use super::{BatchLifecycle, TransitionReport};
use crate::batch::{
    commands::require_text, BatchStatus, ManufacturerAssignment, ManufacturerSelection, Quote,
    QuoteSubmission,
};
use crate::config::LabelConfig;
use crate::error::LifecycleError;
use crate::identity::Identity;
use crate::notifications::LifecycleEvent;
use crate::store::BatchStore;

/// Draws `<prefix>-<batch id>-<digits>` labels that no other batch uses yet.
#[derive(Debug, Clone)]
pub struct LabelGenerator {
    settings: LabelConfig,
}

impl LabelGenerator {
    pub fn new(settings: LabelConfig) -> Self {
        Self { settings }
    }

    pub fn draw(&self, batch_id: &str) -> String {
        let digits = self.settings.digits.clamp(1, 9);
        let low = 10u32.pow(digits - 1);
        let high = 10u32.pow(digits);
        let suffix = rand::rng().random_range(low..high);
        format!("{}-{}-{}", self.settings.prefix, batch_id, suffix)
    }

    /// Re-draws while the label is taken, up to the configured number of attempts.
    pub async fn generate(
        &self,
        batch_id: &str,
        store: &dyn BatchStore,
    ) -> Result<String, LifecycleError> {
        for attempt in 1..=self.settings.max_attempts.max(1) {
            let label = self.draw(batch_id);
            match store.find_by_unit_id(&label).await? {
                None => return Ok(label),
                Some(existing) => {
                    debug!(label = %label, owner = %existing.batch_id, attempt, "Label already in use, redrawing")
                }
            }
        }
        Err(LifecycleError::conflict(format!(
            "no unused label found for batch {batch_id} after {} attempts",
            self.settings.max_attempts
        )))
    }
}

impl BatchLifecycle {
    /// Append the caller's quote. One quote per manufacturer, checked inside the write.
    pub async fn submit_quote(
        &self,
        caller: &Identity,
        batch_id: &str,
        submission: QuoteSubmission,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::SubmitQuote;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            submission.validate()?;

            let quote = Quote {
                quote_id: format!("QUOTE-{}", uuid::Uuid::new_v4().simple()),
                manufacturer_id: caller.actor_id.clone(),
                manufacturer_name: caller.display_name.clone(),
                price: submission.price,
                submitted_at: Utc::now(),
            };
            let record = self
                .commit(operation, caller, &GuardInput::default(), batch_id, &|record| {
                    record.quotes.push(quote.clone());
                    Ok(())
                })
                .await?;
            info!(batch_id = %batch_id, manufacturer_id = %caller.actor_id, price = %quote.price, "Quote submitted");

            let mut follow_ups = Vec::new();
            self.notify(
                LifecycleEvent::QuoteReceived {
                    batch_id: record.batch_id.clone(),
                    manufacturer_name: quote.manufacturer_name.clone(),
                    price: quote.price,
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }

    /// Award the batch to a manufacturer that has a quote on file.
    pub async fn select_manufacturer(
        &self,
        caller: &Identity,
        batch_id: &str,
        selection: ManufacturerSelection,
    ) -> Result<TransitionReport, LifecycleError> {
        let operation = Operation::SelectManufacturer;
        self.observe(operation, Some(batch_id), caller, async {
            guards::authorize_role(operation, caller)?;
            require_text("manufacturer_id", &selection.manufacturer_id)?;
            let selected = selection.manufacturer_id.as_str();
            let input = GuardInput {
                selected_manufacturer: Some(selected),
                ..GuardInput::default()
            };

            self.load_checked(operation, caller, &input, batch_id).await?;
            let label_id = self.labels.generate(batch_id, self.store.as_ref()).await?;

            let assigned_at = Utc::now();
            let record = self
                .commit(operation, caller, &input, batch_id, &|record| {
                    let quote = record.quote_from(selected).cloned().ok_or_else(|| {
                        LifecycleError::invalid_state(
                            operation.name(),
                            format!("{selected} has no quote on file"),
                        )
                    })?;
                    record.manufacturer_assignment = Some(ManufacturerAssignment {
                        manufacturer_id: quote.manufacturer_id,
                        manufacturer_name: quote.manufacturer_name,
                        price: quote.price,
                        label_id: label_id.clone(),
                        assigned_at,
                    });
                    record.status = BatchStatus::ManufacturingAssigned;
                    Ok(())
                })
                .await?;
            info!(batch_id = %batch_id, manufacturer_id = %selected, label_id = %label_id, "Manufacturer selected");

            let mut follow_ups = Vec::new();
            self.notify(
                LifecycleEvent::ManufacturerSelected {
                    batch_id: record.batch_id.clone(),
                    manufacturer_id: selected.to_string(),
                },
                &mut follow_ups,
            )
            .await;
            Ok(TransitionReport::with_follow_ups(record, follow_ups))
        })
        .await
    }
}
