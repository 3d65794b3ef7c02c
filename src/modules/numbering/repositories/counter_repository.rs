use std::sync::Arc;

use crate::core::{AppError, Result};
use crate::modules::numbering::models::InvoiceNumberCounter;
use crate::store::{DocumentStore, StoreError, StoreResult};

pub const INVOICE_COUNTERS: &str = "invoice_counters";

/// Counter documents keyed by year
pub struct CounterRepository {
    store: Arc<dyn DocumentStore>,
}

impl CounterRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Current counter and its version, `None` if the year has not started
    pub async fn load(&self, year: i32) -> StoreResult<Option<(InvoiceNumberCounter, u64)>> {
        match self.store.get(INVOICE_COUNTERS, &year.to_string()).await {
            Ok(doc) => {
                let counter = serde_json::from_value(doc.body).map_err(|e| {
                    StoreError::Malformed(format!("counter {}: {}", year, e))
                })?;
                Ok(Some((counter, doc.version)))
            }
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create the year's counter at sequence 1; `Conflict` if another caller got there first
    pub async fn start_year(&self, year: i32) -> StoreResult<InvoiceNumberCounter> {
        let counter = InvoiceNumberCounter::first(year);
        self.store
            .insert(INVOICE_COUNTERS, &year.to_string(), to_body(&counter)?)
            .await?;
        Ok(counter)
    }

    /// Conditional write of the next counter value
    pub async fn advance(&self, counter: InvoiceNumberCounter, version: u64) -> Result<InvoiceNumberCounter> {
        let next = counter.advanced().ok_or_else(|| {
            AppError::internal(format!("Invoice sequence for {} is exhausted", counter.year))
        })?;

        self.store
            .update(
                INVOICE_COUNTERS,
                &counter.year.to_string(),
                version,
                to_body(&next)?,
            )
            .await?;
        Ok(next)
    }
}

fn to_body(counter: &InvoiceNumberCounter) -> StoreResult<serde_json::Value> {
    serde_json::to_value(counter).map_err(|e| StoreError::Malformed(e.to_string()))
}
