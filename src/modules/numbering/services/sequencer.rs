// Invoice number allocation.
//
// Numbers come from a per-year counter document advanced with a conditional
// write. Losing the race re-reads and tries again. When the store cannot be
// reached, or the counter stays contended past the retry limit, a provisional
// number is handed out instead so that invoice creation never blocks on the
// counter. Provisional invoices are flagged and can be renumbered later.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::numbering::models::{format_invoice_number, AssignedNumber};
use crate::modules::numbering::repositories::CounterRepository;
use crate::store::DocumentStore;

pub struct InvoiceNumberSequencer {
    counters: CounterRepository,
    retry_limit: u32,
}

impl InvoiceNumberSequencer {
    pub fn new(store: Arc<dyn DocumentStore>, retry_limit: u32) -> Self {
        Self {
            counters: CounterRepository::new(store),
            retry_limit: retry_limit.max(1),
        }
    }

    /// Next number for the year of `now`. Falls back to a provisional number
    /// instead of failing when the counter is out of reach.
    pub async fn assign(&self, now: DateTime<Utc>) -> AssignedNumber {
        let year = now.year();

        match self.next_sequential(year).await {
            Ok(value) => AssignedNumber {
                value,
                provisional: false,
            },
            Err(e) => {
                let value = provisional_number(now);
                warn!(
                    year,
                    provisional = %value,
                    error = %e,
                    "Invoice counter unavailable, issuing provisional number"
                );
                AssignedNumber {
                    value,
                    provisional: true,
                }
            }
        }
    }

    /// Strictly sequential allocation. Errors when the counter cannot be advanced.
    pub async fn next_sequential(&self, year: i32) -> Result<String> {
        for attempt in 1..=self.retry_limit {
            let current = self.counters.load(year).await?;

            let outcome = match current {
                None => self.counters.start_year(year).await.map_err(AppError::from),
                Some((counter, version)) => self.counters.advance(counter, version).await,
            };

            match outcome {
                Ok(counter) => return Ok(format_invoice_number(year, counter.last_sequence)),
                Err(AppError::Conflict(_)) => {
                    debug!(year, attempt, "Invoice counter contended, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(format!(
            "Invoice counter for {} stayed contended after {} attempts",
            year, self.retry_limit
        )))
    }
}

/// `INV-<year>-T<millis>-<8 hex>`; unique without touching the store
pub fn provisional_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "INV-{}-T{}-{}",
        now.year(),
        now.timestamp_millis(),
        &suffix[..8]
    )
}

/// Whether a number was produced by [`provisional_number`]
pub fn is_provisional_format(number: &str) -> bool {
    number
        .splitn(3, '-')
        .nth(2)
        .map(|rest| rest.starts_with('T'))
        .unwrap_or(false)
}
