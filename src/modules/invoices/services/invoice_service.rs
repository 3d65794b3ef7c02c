use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{info, warn};

use crate::core::{AppError, Result};
use crate::modules::gateways::services::{PaymentGateway, PaymentLinkRequest};
use crate::modules::invoices::models::{
    CreateInvoiceRequest, Invoice, InvoiceStatus, UpdateInvoiceRequest,
};
use crate::modules::invoices::repositories::{InvoiceRepository, Mutation};
use crate::modules::invoices::services::status_engine::{StatusEngine, StatusTrigger};
use crate::modules::numbering::InvoiceNumberSequencer;

/// Service for invoice business logic
pub struct InvoiceService {
    invoice_repo: Arc<InvoiceRepository>,
    sequencer: Arc<InvoiceNumberSequencer>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    strict_numbering: bool,
}

impl InvoiceService {
    pub fn new(invoice_repo: Arc<InvoiceRepository>, sequencer: Arc<InvoiceNumberSequencer>) -> Self {
        Self {
            invoice_repo,
            sequencer,
            gateway: None,
            strict_numbering: false,
        }
    }

    /// Enable payment links and auto-pay
    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Refuse to create invoices when no sequential number can be allocated
    pub fn with_strict_numbering(mut self, strict: bool) -> Self {
        self.strict_numbering = strict;
        self
    }

    /// Create an invoice in DRAFT, or published straight away when the
    /// request asks for it
    ///
    /// Input is fully validated before a number is allocated.
    pub async fn create_invoice(&self, request: CreateInvoiceRequest) -> Result<Invoice> {
        let now = Utc::now();
        let publish = request.publish;

        let mut invoice = Invoice::new(request, String::new(), false, now)?;
        if publish {
            StatusEngine::apply(
                &mut invoice,
                StatusTrigger::Publish {
                    today: now.date_naive(),
                },
                now,
            )?;
        }

        if self.strict_numbering {
            invoice.invoice_number = self.sequencer.next_sequential(now.year()).await?;
        } else {
            let assigned = self.sequencer.assign(now).await;
            invoice.invoice_number = assigned.value;
            invoice.provisional_number = assigned.provisional;
        }

        let created = self.invoice_repo.create(&invoice).await?;
        info!(
            invoice_id = %created.id,
            invoice_number = %created.invoice_number,
            status = %created.status,
            total_amount = created.total_amount,
            provisional = created.provisional_number,
            "Invoice created"
        );

        if publish {
            return Ok(self.attach_auto_pay_link(created).await);
        }
        Ok(created)
    }

    pub async fn get_invoice(&self, id: &str) -> Result<Invoice> {
        self.invoice_repo.get(id).await
    }

    pub async fn list_invoices(&self, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>> {
        self.invoice_repo.list(status).await
    }

    /// Edit a DRAFT or SCHEDULED invoice; totals are recomputed in the same write
    pub async fn update_invoice(&self, id: &str, update: UpdateInvoiceRequest) -> Result<Invoice> {
        let (invoice, _) = self
            .invoice_repo
            .modify(id, |invoice| {
                invoice.apply_update(update.clone(), Utc::now())?;
                Ok(Mutation::Write)
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            total_amount = invoice.total_amount,
            "Invoice updated"
        );
        Ok(invoice)
    }

    /// DRAFT to SENT, or to SCHEDULED when the send date is in the future
    pub async fn publish_invoice(&self, id: &str) -> Result<Invoice> {
        let (invoice, _) = self
            .invoice_repo
            .modify(id, |invoice| {
                let now = Utc::now();
                StatusEngine::apply(
                    invoice,
                    StatusTrigger::Publish {
                        today: now.date_naive(),
                    },
                    now,
                )?;
                Ok(Mutation::Write)
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            status = %invoice.status,
            "Invoice published"
        );
        Ok(self.attach_auto_pay_link(invoice).await)
    }

    pub async fn cancel_invoice(&self, id: &str) -> Result<Invoice> {
        let (invoice, _) = self
            .invoice_repo
            .modify(id, |invoice| {
                StatusEngine::apply(invoice, StatusTrigger::Cancel, Utc::now())?;
                Ok(Mutation::Write)
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            amount_paid = invoice.amount_paid,
            "Invoice canceled"
        );
        Ok(invoice)
    }

    /// PAID to REFUNDED. Payment history is left as recorded.
    pub async fn refund_invoice(&self, id: &str, reason: &str, recorded_by: &str) -> Result<Invoice> {
        if reason.trim().is_empty() {
            return Err(AppError::validation("Refund reason cannot be empty"));
        }
        if recorded_by.trim().is_empty() {
            return Err(AppError::validation("recordedBy cannot be empty"));
        }

        let (invoice, _) = self
            .invoice_repo
            .modify(id, |invoice| {
                StatusEngine::apply(invoice, StatusTrigger::Refund, Utc::now())?;
                invoice.refund_reason = Some(reason.to_string());
                Ok(Mutation::Write)
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            recorded_by,
            amount_paid = invoice.amount_paid,
            "Invoice refunded"
        );
        Ok(invoice)
    }

    /// Hard delete; only a DRAFT with no payments qualifies
    pub async fn delete_invoice(&self, id: &str) -> Result<()> {
        let invoice = self
            .invoice_repo
            .delete_checked(id, StatusEngine::ensure_deletable)
            .await?;
        info!(invoice_id = %id, invoice_number = %invoice.invoice_number, "Invoice deleted");
        Ok(())
    }

    /// Replace a provisional number with the next sequential one for the
    /// invoice's creation year
    pub async fn renumber_invoice(&self, id: &str) -> Result<Invoice> {
        let current = self.invoice_repo.get(id).await?;
        if !current.provisional_number {
            return Err(AppError::validation(format!(
                "Invoice {} already has a sequential number",
                current.invoice_number
            )));
        }

        let number = self
            .sequencer
            .next_sequential(current.created_at.year())
            .await?;

        let (invoice, written) = self
            .invoice_repo
            .modify(id, |invoice| {
                if !invoice.provisional_number {
                    return Ok(Mutation::Skip);
                }
                invoice.invoice_number = number.clone();
                invoice.provisional_number = false;
                invoice.updated_at = Utc::now();
                Ok(Mutation::Write)
            })
            .await?;

        if written {
            info!(
                invoice_id = %invoice.id,
                provisional = %current.invoice_number,
                invoice_number = %invoice.invoice_number,
                "Invoice renumbered"
            );
        } else {
            warn!(
                invoice_id = %invoice.id,
                unused_number = %number,
                "Invoice was renumbered concurrently; allocated number left unused"
            );
        }
        Ok(invoice)
    }

    /// Ask the gateway for a hosted payment page covering the amount due
    ///
    /// A gateway failure leaves the invoice unchanged and payable by other means.
    pub async fn create_payment_link(&self, id: &str, customer_email: Option<String>) -> Result<Invoice> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| AppError::gateway("No payment gateway is configured"))?;

        let invoice = self.invoice_repo.get(id).await?;
        if !invoice.status.is_payable() || invoice.amount_due <= 0 {
            return Err(AppError::validation(format!(
                "Invoice {} is {} with {} due; nothing to collect",
                invoice.invoice_number, invoice.status, invoice.amount_due
            )));
        }

        let link = gateway
            .create_payment_link(PaymentLinkRequest {
                invoice_id: invoice.id.clone(),
                invoice_number: invoice.invoice_number.clone(),
                amount: invoice.amount_due,
                customer_email: customer_email.or_else(|| invoice.billing_email.clone()),
            })
            .await?;

        let (invoice, _) = self
            .invoice_repo
            .modify(id, |invoice| {
                invoice.payment_link_url = Some(link.url.clone());
                invoice.updated_at = Utc::now();
                Ok(Mutation::Write)
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            gateway = gateway.name(),
            gateway_reference = %link.gateway_reference,
            "Payment link created"
        );
        Ok(invoice)
    }

    /// Best effort: a published auto-pay invoice gets a payment link. Failure
    /// is logged and the invoice is returned as it was.
    async fn attach_auto_pay_link(&self, invoice: Invoice) -> Invoice {
        if !invoice.auto_pay_enabled || self.gateway.is_none() || invoice.amount_due <= 0 {
            return invoice;
        }

        match self.create_payment_link(&invoice.id, None).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(
                    invoice_id = %invoice.id,
                    error = %e,
                    "Auto-pay link could not be created"
                );
                invoice
            }
        }
    }
}
