use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::core::money::format_minor_units;
use crate::core::{AppError, Result};
use crate::modules::invoices::models::Invoice;
use crate::modules::invoices::repositories::{InvoiceRepository, Mutation};
use crate::modules::invoices::services::status_engine::{StatusEngine, StatusTrigger};
use crate::modules::payments::models::{Payment, RecordPaymentRequest};

/// Outcome of recording a payment
#[derive(Debug, Clone)]
pub struct RecordedPayment {
    pub invoice: Invoice,
    /// The transaction id was already on the invoice; nothing was written
    pub duplicate: bool,
}

/// Records payments against invoices
///
/// Every check that depends on invoice state runs inside the conditional
/// write, so a concurrent payment or sweep is seen before this one commits.
pub struct PaymentRecorder {
    invoice_repo: Arc<InvoiceRepository>,
}

impl PaymentRecorder {
    pub fn new(invoice_repo: Arc<InvoiceRepository>) -> Self {
        Self { invoice_repo }
    }

    /// Record a payment (manual entry or gateway webhook)
    ///
    /// A request carrying a `transaction_id` that is already on the invoice is
    /// a successful no-op, whatever the invoice's current status.
    ///
    /// # Errors
    /// * `Validation` - Non-positive amount, blank actor, or overpayment
    /// * `InvalidTransition` - Invoice is not payable, or a partial payment is
    ///   not allowed on it
    /// * `Conflict` - Concurrent writers kept winning past the retry limit
    pub async fn record(&self, invoice_id: &str, request: RecordPaymentRequest) -> Result<RecordedPayment> {
        Self::validate_request(&request)?;

        let now = Utc::now();
        let payment_id = Uuid::new_v4().to_string();
        let transaction_id = request.transaction_id.clone();

        let (invoice, written) = self
            .invoice_repo
            .modify(invoice_id, |invoice| {
                if let Some(txn) = transaction_id.as_deref() {
                    if invoice.find_payment_by_transaction(txn).is_some() {
                        return Ok(Mutation::Skip);
                    }
                }

                Self::ensure_acceptable(invoice, request.amount)?;

                invoice.payments.push(Payment {
                    id: payment_id.clone(),
                    amount: request.amount,
                    method: request.method,
                    paid_at: now,
                    note: request.note.clone(),
                    transaction_id: transaction_id.clone(),
                    recorded_by: request.recorded_by.clone(),
                });
                invoice.amount_paid += request.amount;
                invoice.amount_due = invoice.total_amount - invoice.amount_paid;

                StatusEngine::apply(invoice, StatusTrigger::PaymentApplied, now)?;
                Ok(Mutation::Write)
            })
            .await?;

        if written {
            info!(
                invoice_id = %invoice.id,
                invoice_number = %invoice.invoice_number,
                amount = request.amount,
                method = %request.method,
                status = %invoice.status,
                amount_due = invoice.amount_due,
                "Payment recorded"
            );
        } else {
            info!(
                invoice_id = %invoice.id,
                transaction_id = transaction_id.as_deref().unwrap_or_default(),
                "Payment already recorded (idempotent replay)"
            );
        }

        Ok(RecordedPayment {
            invoice,
            duplicate: !written,
        })
    }

    fn validate_request(request: &RecordPaymentRequest) -> Result<()> {
        if request.amount <= 0 {
            return Err(AppError::validation(format!(
                "Payment amount must be positive, got: {}",
                request.amount
            )));
        }

        if request.recorded_by.trim().is_empty() {
            return Err(AppError::validation("recordedBy cannot be empty"));
        }

        if let Some(txn) = &request.transaction_id {
            if txn.trim().is_empty() {
                return Err(AppError::validation("transactionId cannot be blank"));
            }
        }

        Ok(())
    }

    /// Checks made against the freshly read invoice. The partial-payment
    /// guard is left to the status engine so that it reports the transition.
    fn ensure_acceptable(invoice: &Invoice, amount: i64) -> Result<()> {
        if !invoice.status.is_payable() {
            return StatusEngine::target(invoice, StatusTrigger::PaymentApplied).map(|_| ());
        }

        if amount > invoice.amount_due {
            return Err(AppError::validation(format!(
                "Payment of {} exceeds amount due {} on invoice {}",
                format_minor_units(amount),
                format_minor_units(invoice.amount_due),
                invoice.invoice_number
            )));
        }

        Ok(())
    }
}
