// Invoice aggregate root.
//
// The invoice carries its own payment history. Derived money fields
// (subtotal, tax, total, paid, due) are persisted alongside the inputs they
// come from so the store can be queried on them, and are recomputed in the
// same write as any change to those inputs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::line_item::{build_line_items, LineItem, LineItemInput};
use super::status::InvoiceStatus;
use crate::core::money::ensure_non_negative;
use crate::core::{AppError, MinorUnits, Result};
use crate::modules::invoices::services::totals_calculator::TotalsCalculator;
use crate::modules::payments::models::Payment;

/// Represents a client invoice together with its payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Store key, assigned on creation
    #[serde(skip)]
    pub id: String,

    /// Store version observed when this copy was read
    #[serde(skip)]
    pub version: u64,

    /// `INV-<year>-<seq>`; immutable once assigned
    pub invoice_number: String,

    /// Number came from the fallback path and awaits renumbering
    #[serde(default)]
    pub provisional_number: bool,

    pub client_id: String,
    pub project_id: Option<String>,

    /// Where hosted payment links are sent
    pub billing_email: Option<String>,

    /// Display order is insertion order
    pub line_items: Vec<LineItem>,

    /// Decimal fraction, 0 <= rate < 1
    pub tax_rate: Decimal,
    pub discount_amount: MinorUnits,

    pub subtotal: MinorUnits,
    pub tax_amount: MinorUnits,
    pub total_amount: MinorUnits,

    pub amount_paid: MinorUnits,
    pub amount_due: MinorUnits,

    pub status: InvoiceStatus,

    /// Append-only
    #[serde(default)]
    pub payments: Vec<Payment>,

    pub due_date: NaiveDate,
    pub issue_date: Option<NaiveDate>,
    pub scheduled_send_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_reason: Option<String>,

    /// Hosted checkout URL from the payment gateway, if one was requested
    pub payment_link_url: Option<String>,

    pub allow_partial_payments: bool,
    pub auto_pay_enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub client_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub billing_email: Option<String>,
    pub line_items: Vec<LineItemInput>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_amount: MinorUnits,
    /// Required; `None` is rejected with a validation error
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_send_date: Option<NaiveDate>,
    #[serde(default)]
    pub allow_partial_payments: bool,
    #[serde(default)]
    pub auto_pay_enabled: bool,
    /// Publish straight away instead of leaving the invoice in DRAFT
    #[serde(default)]
    pub publish: bool,
}

/// Partial edit of a DRAFT or SCHEDULED invoice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateInvoiceRequest {
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub billing_email: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
    pub tax_rate: Option<Decimal>,
    pub discount_amount: Option<MinorUnits>,
    pub due_date: Option<NaiveDate>,
    pub scheduled_send_date: Option<NaiveDate>,
    pub clear_scheduled_send_date: bool,
    pub allow_partial_payments: Option<bool>,
    pub auto_pay_enabled: Option<bool>,
}

/// API view of an invoice
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: String,
    pub version: u64,
    pub is_mutable: bool,
    #[serde(flatten)]
    pub invoice: Invoice,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id.clone(),
            version: invoice.version,
            is_mutable: invoice.is_mutable(),
            invoice,
        }
    }
}

impl Invoice {
    /// Build a validated DRAFT invoice with computed totals
    pub fn new(
        request: CreateInvoiceRequest,
        invoice_number: String,
        provisional_number: bool,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Self::validate_client_id(&request.client_id)?;
        Self::validate_billing_email(request.billing_email.as_deref())?;

        let due_date = request
            .due_date
            .ok_or_else(|| AppError::validation("Due date is required"))?;
        Self::validate_schedule(request.scheduled_send_date, due_date)?;

        if request.line_items.is_empty() {
            return Err(AppError::validation(
                "Invoice must have at least one line item",
            ));
        }
        let line_items = build_line_items(request.line_items)?;

        TotalsCalculator::validate_tax_rate(request.tax_rate)?;
        ensure_non_negative(request.discount_amount, "Discount amount")?;

        let mut invoice = Self {
            id: String::new(),
            version: 0,
            invoice_number,
            provisional_number,
            client_id: request.client_id,
            project_id: request.project_id,
            billing_email: request.billing_email,
            line_items,
            tax_rate: request.tax_rate,
            discount_amount: request.discount_amount,
            subtotal: 0,
            tax_amount: 0,
            total_amount: 0,
            amount_paid: 0,
            amount_due: 0,
            status: InvoiceStatus::Draft,
            payments: Vec::new(),
            due_date,
            issue_date: None,
            scheduled_send_date: request.scheduled_send_date,
            paid_at: None,
            canceled_at: None,
            refunded_at: None,
            refund_reason: None,
            payment_link_url: None,
            allow_partial_payments: request.allow_partial_payments,
            auto_pay_enabled: request.auto_pay_enabled,
            created_at: now,
            updated_at: now,
        };

        invoice.recompute_totals()?;
        Ok(invoice)
    }

    /// Recalculate subtotal, tax, total and amount due from the current inputs
    pub fn recompute_totals(&mut self) -> Result<()> {
        let totals =
            TotalsCalculator::calculate(&self.line_items, self.tax_rate, self.discount_amount)?;

        self.subtotal = totals.subtotal;
        self.tax_amount = totals.tax_amount;
        self.total_amount = totals.total_amount;
        self.amount_due = self.total_amount - self.amount_paid;
        Ok(())
    }

    /// Apply an edit. Only DRAFT and SCHEDULED invoices accept edits.
    pub fn apply_update(&mut self, update: UpdateInvoiceRequest, now: DateTime<Utc>) -> Result<()> {
        if !self.is_mutable() {
            return Err(AppError::validation(format!(
                "Invoice {} is {}; only DRAFT or SCHEDULED invoices can be edited",
                self.invoice_number, self.status
            )));
        }

        if let Some(client_id) = update.client_id {
            Self::validate_client_id(&client_id)?;
            self.client_id = client_id;
        }
        if let Some(project_id) = update.project_id {
            self.project_id = Some(project_id);
        }
        if let Some(email) = update.billing_email {
            Self::validate_billing_email(Some(&email))?;
            self.billing_email = Some(email);
        }
        if let Some(inputs) = update.line_items {
            if inputs.is_empty() {
                return Err(AppError::validation(
                    "Invoice must have at least one line item",
                ));
            }
            self.line_items = build_line_items(inputs)?;
        }
        if let Some(rate) = update.tax_rate {
            TotalsCalculator::validate_tax_rate(rate)?;
            self.tax_rate = rate;
        }
        if let Some(discount) = update.discount_amount {
            ensure_non_negative(discount, "Discount amount")?;
            self.discount_amount = discount;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if update.clear_scheduled_send_date {
            if self.status == InvoiceStatus::Scheduled {
                return Err(AppError::validation(
                    "A SCHEDULED invoice must keep its scheduled send date",
                ));
            }
            self.scheduled_send_date = None;
        }
        if let Some(date) = update.scheduled_send_date {
            self.scheduled_send_date = Some(date);
        }
        Self::validate_schedule(self.scheduled_send_date, self.due_date)?;

        if let Some(flag) = update.allow_partial_payments {
            self.allow_partial_payments = flag;
        }
        if let Some(flag) = update.auto_pay_enabled {
            self.auto_pay_enabled = flag;
        }

        if self.status == InvoiceStatus::Scheduled && !self.has_billable_line_item() {
            return Err(AppError::validation(
                "A SCHEDULED invoice needs at least one line item with a description and a positive amount",
            ));
        }

        self.recompute_totals()?;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_mutable(&self) -> bool {
        self.status.is_mutable()
    }

    pub fn has_payments(&self) -> bool {
        !self.payments.is_empty()
    }

    pub fn has_billable_line_item(&self) -> bool {
        self.line_items.iter().any(LineItem::is_billable)
    }

    pub fn find_payment_by_transaction(&self, transaction_id: &str) -> Option<&Payment> {
        self.payments
            .iter()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
    }

    /// `amount_paid + amount_due == total_amount` and paid equals the payment history
    pub fn is_balanced(&self) -> bool {
        let recorded: MinorUnits = self.payments.iter().map(|p| p.amount).sum();
        self.amount_paid + self.amount_due == self.total_amount && recorded == self.amount_paid
    }

    fn validate_client_id(client_id: &str) -> Result<()> {
        if client_id.trim().is_empty() {
            return Err(AppError::validation("Client ID cannot be empty"));
        }
        Ok(())
    }

    fn validate_billing_email(email: Option<&str>) -> Result<()> {
        match email {
            Some(email) if !email.contains('@') || email.trim() != email => Err(
                AppError::validation(format!("Invalid billing email: {}", email)),
            ),
            _ => Ok(()),
        }
    }

    fn validate_schedule(scheduled: Option<NaiveDate>, due_date: NaiveDate) -> Result<()> {
        match scheduled {
            Some(date) if date > due_date => Err(AppError::validation(format!(
                "Scheduled send date {} is after due date {}",
                date, due_date
            ))),
            _ => Ok(()),
        }
    }
}
