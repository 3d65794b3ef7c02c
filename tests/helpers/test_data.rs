use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ledgerbook::app::{Ledger, LedgerOptions};
use ledgerbook::invoices::models::{CreateInvoiceRequest, LineItemInput};
use ledgerbook::payments::{PaymentMethod, RecordPaymentRequest};
use ledgerbook::store::DocumentStore;

/// Test data factory for generating realistic test payloads
pub struct TestDataFactory;

impl TestDataFactory {
    pub fn item(description: &str, quantity: u32, unit_price: i64) -> LineItemInput {
        LineItemInput {
            description: description.to_string(),
            quantity,
            unit_price,
        }
    }

    /// {2 x $100, 1 x $50, 1 x $25}, 8% tax, $10 discount: total $449.00
    pub fn reference_invoice(allow_partial_payments: bool) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            client_id: "client-acme".to_string(),
            project_id: Some("project-website".to_string()),
            billing_email: Some("ap@acme.test".to_string()),
            line_items: vec![
                Self::item("Design", 2, 10_000),
                Self::item("Hosting", 1, 5_000),
                Self::item("Domain", 1, 2_500),
            ],
            tax_rate: dec!(0.08),
            discount_amount: 1_000,
            due_date: Some(Self::days_from_today(30)),
            scheduled_send_date: None,
            allow_partial_payments,
            auto_pay_enabled: false,
            publish: true,
        }
    }

    /// Single untaxed line item
    pub fn simple_invoice(amount: i64, publish: bool) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            client_id: "client-simple".to_string(),
            project_id: None,
            billing_email: None,
            line_items: vec![Self::item("Consulting", 1, amount)],
            tax_rate: Decimal::ZERO,
            discount_amount: 0,
            due_date: Some(Self::days_from_today(14)),
            scheduled_send_date: None,
            allow_partial_payments: false,
            auto_pay_enabled: false,
            publish,
        }
    }

    pub fn payment(amount: i64, transaction_id: Option<&str>) -> RecordPaymentRequest {
        RecordPaymentRequest {
            amount,
            method: PaymentMethod::BankTransfer,
            note: None,
            transaction_id: transaction_id.map(str::to_string),
            recorded_by: "test-user".to_string(),
        }
    }

    pub fn days_from_today(days: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days)
    }
}

/// Ledger over the given store, no gateway
pub fn ledger_over(store: Arc<dyn DocumentStore>) -> Ledger {
    Ledger::new(store, LedgerOptions::default(), None)
}
