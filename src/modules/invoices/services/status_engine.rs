//! Invoice status state machine.
//!
//! Every status change in the ledger goes through [`StatusEngine::apply`],
//! which checks the trigger's guard against the invoice as it is *inside* the
//! conditional write, not against an earlier snapshot. A failed guard returns
//! `InvalidTransition` and leaves the invoice untouched.
//!
//! ```text
//! DRAFT ──publish──▶ SENT | SCHEDULED
//! SCHEDULED ──send date reached──▶ SENT
//! SENT | SCHEDULED | PARTIALLY_PAID | OVERDUE ──payment──▶ PARTIALLY_PAID | PAID
//! SENT | PARTIALLY_PAID ──past due──▶ OVERDUE
//! any non-terminal ──cancel──▶ CANCELED
//! PAID ──refund──▶ REFUNDED
//! ```

use chrono::{DateTime, NaiveDate, Utc};

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};

/// What is asking for a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTrigger {
    Publish { today: NaiveDate },
    ScheduledDateReached { today: NaiveDate },
    /// Amounts have already been updated for the new payment
    PaymentApplied,
    DueDatePassed { today: NaiveDate },
    Cancel,
    Refund,
}

pub struct StatusEngine;

impl StatusEngine {
    /// The legal transition table
    pub fn is_allowed(from: InvoiceStatus, to: InvoiceStatus) -> bool {
        use InvoiceStatus::*;

        match (from, to) {
            (Draft, Sent) | (Draft, Scheduled) | (Scheduled, Sent) => true,
            (Sent | Scheduled | PartiallyPaid | Overdue, PartiallyPaid | Paid) => true,
            (Sent | PartiallyPaid, Overdue) => true,
            (Draft | Scheduled | Sent | PartiallyPaid | Overdue, Canceled) => true,
            (Paid, Refunded) => true,
            _ => false,
        }
    }

    /// Work out the status a trigger leads to, checking its guard
    pub fn target(invoice: &Invoice, trigger: StatusTrigger) -> Result<InvoiceStatus> {
        let from = invoice.status;

        let to = match trigger {
            StatusTrigger::Publish { today } => {
                let to = match invoice.scheduled_send_date {
                    Some(date) if date > today => InvoiceStatus::Scheduled,
                    _ => InvoiceStatus::Sent,
                };
                if from != InvoiceStatus::Draft {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(to),
                        "only DRAFT invoices can be published",
                    ));
                }
                if !invoice.has_billable_line_item() {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(to),
                        "at least one line item with a description and a positive amount is required",
                    ));
                }
                to
            }
            StatusTrigger::ScheduledDateReached { today } => {
                let reached = invoice
                    .scheduled_send_date
                    .map(|date| date <= today)
                    .unwrap_or(true);
                if from != InvoiceStatus::Scheduled || !reached {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(InvoiceStatus::Sent),
                        "scheduled send date has not been reached",
                    ));
                }
                InvoiceStatus::Sent
            }
            StatusTrigger::PaymentApplied => {
                let to = if invoice.amount_paid >= invoice.total_amount {
                    InvoiceStatus::Paid
                } else {
                    InvoiceStatus::PartiallyPaid
                };
                if !from.is_payable() {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(to),
                        format!("payments are only accepted while {}", payable_list()),
                    ));
                }
                if invoice.amount_paid <= 0 {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(to),
                        "no payment has been applied",
                    ));
                }
                if to == InvoiceStatus::PartiallyPaid && !invoice.allow_partial_payments {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(to),
                        "partial payments are not allowed on this invoice",
                    ));
                }
                to
            }
            StatusTrigger::DueDatePassed { today } => {
                if !Self::is_overdue(invoice, today) {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(InvoiceStatus::Overdue),
                        "invoice must be SENT or PARTIALLY_PAID, past its due date, with a balance due",
                    ));
                }
                InvoiceStatus::Overdue
            }
            StatusTrigger::Cancel => match from {
                InvoiceStatus::Paid => {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(InvoiceStatus::Canceled),
                        "paid invoices cannot be canceled; refund instead",
                    ))
                }
                closed if closed.is_terminal() => {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(InvoiceStatus::Canceled),
                        "invoice is already closed",
                    ))
                }
                _ => InvoiceStatus::Canceled,
            },
            StatusTrigger::Refund => {
                if from != InvoiceStatus::Paid {
                    return Err(AppError::invalid_transition(
                        from,
                        Some(InvoiceStatus::Refunded),
                        "only PAID invoices can be refunded",
                    ));
                }
                InvoiceStatus::Refunded
            }
        };

        if !Self::is_allowed(from, to) {
            return Err(AppError::invalid_transition(
                from,
                Some(to),
                "transition is not permitted",
            ));
        }

        Ok(to)
    }

    /// Move the invoice to the trigger's target status and stamp the
    /// timestamps that go with it
    pub fn apply(
        invoice: &mut Invoice,
        trigger: StatusTrigger,
        now: DateTime<Utc>,
    ) -> Result<InvoiceStatus> {
        let to = Self::target(invoice, trigger)?;

        match (to, trigger) {
            (
                InvoiceStatus::Sent,
                StatusTrigger::Publish { today } | StatusTrigger::ScheduledDateReached { today },
            ) => {
                invoice.issue_date.get_or_insert(today);
            }
            (InvoiceStatus::Paid, _) => invoice.paid_at = Some(now),
            (InvoiceStatus::Canceled, _) => invoice.canceled_at = Some(now),
            (InvoiceStatus::Refunded, _) => invoice.refunded_at = Some(now),
            _ => {}
        }

        invoice.status = to;
        invoice.updated_at = now;
        Ok(to)
    }

    /// Hard delete is only possible for a DRAFT without payments
    pub fn ensure_deletable(invoice: &Invoice) -> Result<()> {
        if invoice.status != InvoiceStatus::Draft {
            return Err(AppError::invalid_transition(
                invoice.status,
                None,
                "only DRAFT invoices can be deleted; cancel instead",
            ));
        }
        if invoice.has_payments() {
            return Err(AppError::invalid_transition(
                invoice.status,
                None,
                "invoices with recorded payments cannot be deleted",
            ));
        }
        Ok(())
    }

    pub fn is_overdue(invoice: &Invoice, today: NaiveDate) -> bool {
        matches!(
            invoice.status,
            InvoiceStatus::Sent | InvoiceStatus::PartiallyPaid
        ) && invoice.due_date < today
            && invoice.amount_due > 0
    }

    pub fn is_due_for_release(invoice: &Invoice, today: NaiveDate) -> bool {
        invoice.status == InvoiceStatus::Scheduled
            && invoice
                .scheduled_send_date
                .map(|date| date <= today)
                .unwrap_or(true)
    }
}

fn payable_list() -> String {
    InvoiceStatus::PAYABLE
        .iter()
        .map(InvoiceStatus::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
