use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::core::Result;
use crate::modules::invoices::models::{Invoice, InvoiceStatus};
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::invoices::services::status_engine::{StatusEngine, StatusTrigger};

/// Periodic batch transitions: SENT/PARTIALLY_PAID past due to OVERDUE, and
/// SCHEDULED invoices whose send date has arrived to SENT.
///
/// Each invoice is written conditionally on the version it was read at. An
/// invoice that changed in between (paid, canceled) fails its own write and is
/// looked at again on the next tick; the rest of the batch still commits.
pub struct OverdueSweeper {
    invoice_repo: Arc<InvoiceRepository>,
}

impl OverdueSweeper {
    pub fn new(invoice_repo: Arc<InvoiceRepository>) -> Self {
        Self { invoice_repo }
    }

    /// Sweep as of the current UTC date
    pub async fn run(&self) -> Result<usize> {
        self.run_at(Utc::now().date_naive()).await
    }

    /// Move every open invoice with `due_date < today` and a balance due to
    /// OVERDUE. Returns how many were transitioned.
    pub async fn run_at(&self, today: NaiveDate) -> Result<usize> {
        let candidates = self
            .invoice_repo
            .find_by_statuses(&[InvoiceStatus::Sent, InvoiceStatus::PartiallyPaid])
            .await?;

        let transitioned = self
            .transition_all(candidates, StatusTrigger::DueDatePassed { today }, |invoice| {
                StatusEngine::is_overdue(invoice, today)
            })
            .await?;

        if transitioned > 0 {
            info!(transitioned, %today, "Overdue sweep complete");
        } else {
            debug!(%today, "Overdue sweep found nothing to do");
        }
        Ok(transitioned)
    }

    pub async fn release_scheduled(&self) -> Result<usize> {
        self.release_scheduled_at(Utc::now().date_naive()).await
    }

    /// Send SCHEDULED invoices whose `scheduled_send_date <= today`
    pub async fn release_scheduled_at(&self, today: NaiveDate) -> Result<usize> {
        let candidates = self
            .invoice_repo
            .find_by_statuses(&[InvoiceStatus::Scheduled])
            .await?;

        let released = self
            .transition_all(
                candidates,
                StatusTrigger::ScheduledDateReached { today },
                |invoice| StatusEngine::is_due_for_release(invoice, today),
            )
            .await?;

        if released > 0 {
            info!(released, %today, "Scheduled invoices released");
        }
        Ok(released)
    }

    async fn transition_all<P>(
        &self,
        candidates: Vec<Invoice>,
        trigger: StatusTrigger,
        is_due: P,
    ) -> Result<usize>
    where
        P: Fn(&Invoice) -> bool,
    {
        let now = Utc::now();
        let mut batch = Vec::new();

        for mut invoice in candidates.into_iter().filter(|invoice| is_due(invoice)) {
            match StatusEngine::apply(&mut invoice, trigger, now) {
                Ok(_) => batch.push(invoice),
                Err(e) => warn!(
                    invoice_id = %invoice.id,
                    error = %e,
                    "Skipping invoice in sweep"
                ),
            }
        }

        if batch.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = batch.iter().map(|invoice| invoice.id.clone()).collect();
        let outcomes = self.invoice_repo.write_batch(batch).await?;

        let mut committed = 0;
        for (id, outcome) in ids.iter().zip(outcomes) {
            match outcome {
                Ok(invoice) => {
                    debug!(invoice_id = %id, status = %invoice.status, "Invoice transitioned by sweep");
                    committed += 1;
                }
                Err(e) => warn!(
                    invoice_id = %id,
                    error = %e,
                    "Sweep write failed; will retry next tick"
                ),
            }
        }

        Ok(committed)
    }
}
