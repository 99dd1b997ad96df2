// Read-side operations over batch records

use super::guards::cultivator_of;
use super::BatchLifecycle;
use crate::batch::{BatchRecord, BatchStatus, Quote};
use crate::error::LifecycleError;
use crate::identity::{Identity, Role};

fn require_admin(caller: &Identity, what: &str) -> Result<(), LifecycleError> {
    if caller.role != Role::Admin {
        return Err(LifecycleError::forbidden(format!(
            "{what} requires role admin, caller {} has role {}",
            caller.actor_id, caller.role
        )));
    }
    Ok(())
}

impl BatchLifecycle {
    pub async fn get_batch(&self, batch_id: &str) -> Result<BatchRecord, LifecycleError> {
        self.store.get(batch_id).await
    }

    /// Admin dashboard listing, oldest first.
    pub async fn list_batches(
        &self,
        caller: &Identity,
        status: Option<BatchStatus>,
    ) -> Result<Vec<BatchRecord>, LifecycleError> {
        require_admin(caller, "list_batches")?;
        self.store.list(status).await
    }

    /// Quotes on a batch in submission order.
    pub async fn list_quotes(
        &self,
        caller: &Identity,
        batch_id: &str,
    ) -> Result<Vec<Quote>, LifecycleError> {
        require_admin(caller, "list_quotes")?;
        Ok(self.store.get(batch_id).await?.quotes)
    }

    /// Batches waiting on the caller.
    ///
    /// Testers see published lab tasks. Manufacturers see open bidding they have not
    /// quoted on yet plus work assigned to them. Collectors see cultivation and final
    /// anchoring on their own batches. Admins see batches ready to publish or award.
    pub async fn open_tasks(&self, caller: &Identity) -> Result<Vec<BatchRecord>, LifecycleError> {
        let records = self.store.list(None).await?;
        let me = caller.actor_id.as_str();

        let is_open = |record: &BatchRecord| match caller.role {
            Role::Tester => record.status == BatchStatus::TestingAssigned,
            Role::Manufacturer => match record.status {
                BatchStatus::BiddingOpen => record.quote_from(me).is_none(),
                BatchStatus::ManufacturingAssigned | BatchStatus::ManufacturingDone => record
                    .manufacturer_assignment
                    .as_ref()
                    .is_some_and(|a| a.manufacturer_id == me),
                _ => false,
            },
            Role::Collector => {
                cultivator_of(record) == me
                    && (record.status.is_cultivation() || record.status == BatchStatus::Packaged)
            }
            Role::Admin => {
                record.status.is_cultivation()
                    || (record.status == BatchStatus::BiddingOpen && !record.quotes.is_empty())
            }
        };

        Ok(records.into_iter().filter(|record| is_open(record)).collect())
    }
}
