use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::invoices::services::overdue_sweeper::OverdueSweeper;

/// Background job driving the periodic ledger work
///
/// Each tick releases due SCHEDULED invoices, then runs the overdue sweep.
/// Failures are logged and the loop carries on; nothing here is fatal.
pub struct LedgerScheduler {
    sweeper: Arc<OverdueSweeper>,
    invoice_repo: Arc<InvoiceRepository>,
    period: Duration,
}

impl LedgerScheduler {
    pub fn new(
        sweeper: Arc<OverdueSweeper>,
        invoice_repo: Arc<InvoiceRepository>,
        period: Duration,
    ) -> Self {
        Self {
            sweeper,
            invoice_repo,
            period,
        }
    }

    /// Run forever. Spawn this as a tokio task.
    pub async fn start(self: Arc<Self>) {
        info!(period_secs = self.period.as_secs(), "Starting ledger scheduler");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One pass of the periodic work
    pub async fn tick(&self) {
        if let Err(e) = self.sweeper.release_scheduled().await {
            error!(error = %e, "Error releasing scheduled invoices");
        }

        match self.sweeper.run().await {
            Ok(count) if count > 0 => info!(transitioned = count, "Overdue invoices processed"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Error running overdue sweep"),
        }

        match self.invoice_repo.find_provisional().await {
            Ok(pending) if !pending.is_empty() => warn!(
                count = pending.len(),
                "Invoices with provisional numbers are awaiting renumbering"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Error checking provisional invoice numbers"),
        }
    }
}
