// Invoice lifecycle through the service layer
//
// Draft editing, publishing (immediate and scheduled), cancel, refund,
// delete, and hosted payment links against a stand-in gateway.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use helpers::*;
use rust_decimal_macros::dec;

use ledgerbook::app::{Ledger, LedgerOptions};
use ledgerbook::core::{AppError, Result};
use ledgerbook::gateways::{PaymentCompleted, PaymentGateway, PaymentLink, PaymentLinkRequest};
use ledgerbook::invoices::models::{InvoiceStatus, UpdateInvoiceRequest};
use ledgerbook::invoices::repositories::INVOICES;
use ledgerbook::store::MemoryStore;

/// Gateway that hands out predictable links, or fails every call
struct StubGateway {
    fail: bool,
    calls: AtomicUsize,
}

impl StubGateway {
    fn working() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::gateway("stub gateway is down"));
        }
        Ok(PaymentLink {
            gateway_reference: format!("cs_{}", request.invoice_id),
            url: format!("https://pay.test/{}/{}", request.invoice_number, request.amount),
            expires_at: None,
        })
    }

    async fn verify_webhook(&self, _signature: &str, _payload: &str) -> Result<Option<PaymentCompleted>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn ledger_with(gateway: Arc<StubGateway>) -> Ledger {
    Ledger::new(
        Arc::new(MemoryStore::new()),
        LedgerOptions::default(),
        Some(gateway as Arc<dyn PaymentGateway>),
    )
}

#[tokio::test]
async fn test_draft_edit_recomputes_totals() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let mut request = TestDataFactory::reference_invoice(false);
    request.publish = false;
    let draft = ledger.invoices.create_invoice(request).await.unwrap();
    assert_eq!(draft.total_amount, 44_900);

    let edited = ledger
        .invoices
        .update_invoice(
            &draft.id,
            UpdateInvoiceRequest {
                tax_rate: Some(dec!(0.10)),
                discount_amount: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.subtotal, 42_500);
    assert_eq!(edited.tax_amount, 4_250);
    assert_eq!(edited.total_amount, 46_750);
    assert_eq!(edited.amount_due, 46_750);
    assert_eq!(edited.invoice_number, draft.invoice_number);
}

#[tokio::test]
async fn test_invalid_edit_leaves_draft_unchanged() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let draft = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(5_000, false))
        .await
        .unwrap();

    let err = ledger
        .invoices
        .update_invoice(
            &draft.id,
            UpdateInvoiceRequest {
                tax_rate: Some(dec!(1.5)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let stored = ledger.invoices.get_invoice(&draft.id).await.unwrap();
    assert_eq!(stored.total_amount, 5_000);
    assert_eq!(stored.version, draft.version);
}

#[tokio::test]
async fn test_full_lifecycle_to_refund() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let draft = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(12_000, false))
        .await
        .unwrap();
    assert_eq!(draft.status, InvoiceStatus::Draft);

    let sent = ledger.invoices.publish_invoice(&draft.id).await.unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);
    assert!(sent.issue_date.is_some());

    let paid = ledger
        .payments
        .record(&sent.id, TestDataFactory::payment(12_000, Some("wire-1")))
        .await
        .unwrap()
        .invoice;
    assert_eq!(paid.status, InvoiceStatus::Paid);

    let err = ledger.invoices.cancel_invoice(&paid.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: InvoiceStatus::Paid,
            to: Some(InvoiceStatus::Canceled),
            ..
        }
    ));

    let refunded = ledger
        .invoices
        .refund_invoice(&paid.id, "service not delivered", "ops")
        .await
        .unwrap();
    assert_eq!(refunded.status, InvoiceStatus::Refunded);
    assert_eq!(refunded.refund_reason.as_deref(), Some("service not delivered"));
    assert!(refunded.refunded_at.is_some());
    // History is kept as recorded
    assert_eq!(refunded.amount_paid, 12_000);
    assert_eq!(refunded.payments.len(), 1);
}

#[tokio::test]
async fn test_cancel_keeps_partial_payments() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = ledger
        .invoices
        .create_invoice(TestDataFactory::reference_invoice(true))
        .await
        .unwrap();
    ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(10_000, Some("dep-1")))
        .await
        .unwrap();

    let canceled = ledger.invoices.cancel_invoice(&invoice.id).await.unwrap();
    assert_eq!(canceled.status, InvoiceStatus::Canceled);
    assert_eq!(canceled.amount_paid, 10_000);
    assert!(canceled.canceled_at.is_some());

    let err = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(1_000, Some("late")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_publish_without_billable_items_rejected() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let draft = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(0, false))
        .await
        .unwrap();

    let err = ledger.invoices.publish_invoice(&draft.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    assert_eq!(
        ledger.invoices.get_invoice(&draft.id).await.unwrap().status,
        InvoiceStatus::Draft
    );
}

#[tokio::test]
async fn test_scheduled_invoice_stays_editable_until_release() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let mut request = TestDataFactory::simple_invoice(8_000, true);
    request.scheduled_send_date = Some(TestDataFactory::days_from_today(5));
    let scheduled = ledger.invoices.create_invoice(request).await.unwrap();
    assert_eq!(scheduled.status, InvoiceStatus::Scheduled);
    assert!(scheduled.is_mutable());

    let edited = ledger
        .invoices
        .update_invoice(
            &scheduled.id,
            UpdateInvoiceRequest {
                discount_amount: Some(500),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.total_amount, 7_500);

    let released = ledger
        .sweeper
        .release_scheduled_at(TestDataFactory::days_from_today(5))
        .await
        .unwrap();
    assert_eq!(released, 1);

    let sent = ledger.invoices.get_invoice(&scheduled.id).await.unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);
    assert_eq!(sent.issue_date, Some(TestDataFactory::days_from_today(5)));
    assert!(!sent.is_mutable());
}

#[tokio::test]
async fn test_delete_draft_only() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let draft = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(1_000, false))
        .await
        .unwrap();
    let sent = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(1_000, true))
        .await
        .unwrap();

    ledger.invoices.delete_invoice(&draft.id).await.unwrap();
    assert!(matches!(
        ledger.invoices.get_invoice(&draft.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));

    let err = ledger.invoices.delete_invoice(&sent.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { to: None, .. }));
}

#[tokio::test]
async fn test_delete_retries_lost_races() {
    let store = FaultyStore::new();
    let ledger = ledger_over(store.shared());
    let draft = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(1_000, false))
        .await
        .unwrap();

    store.inject_conflicts(INVOICES, 2);
    ledger.invoices.delete_invoice(&draft.id).await.unwrap();
    assert!(matches!(
        ledger.invoices.get_invoice(&draft.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_delete_surfaces_conflict_after_retry_limit() {
    let store = FaultyStore::new();
    let ledger = ledger_over(store.shared());
    let draft = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(1_000, false))
        .await
        .unwrap();

    store.inject_conflicts(INVOICES, LedgerOptions::default().retry_limit);
    let err = ledger.invoices.delete_invoice(&draft.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(ledger.invoices.get_invoice(&draft.id).await.is_ok());
}

#[tokio::test]
async fn test_scheduled_invoice_must_stay_billable() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let mut request = TestDataFactory::simple_invoice(8_000, true);
    request.scheduled_send_date = Some(TestDataFactory::days_from_today(3));
    let scheduled = ledger.invoices.create_invoice(request).await.unwrap();
    assert_eq!(scheduled.status, InvoiceStatus::Scheduled);

    let err = ledger
        .invoices
        .update_invoice(
            &scheduled.id,
            UpdateInvoiceRequest {
                line_items: Some(vec![TestDataFactory::item("Consulting", 0, 8_000)]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let stored = ledger.invoices.get_invoice(&scheduled.id).await.unwrap();
    assert_eq!(stored.total_amount, 8_000);
    assert_eq!(stored.line_items[0].quantity, 1);

    // Drafts may still hold incomplete rows
    let draft = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(8_000, false))
        .await
        .unwrap();
    let edited = ledger
        .invoices
        .update_invoice(
            &draft.id,
            UpdateInvoiceRequest {
                line_items: Some(vec![TestDataFactory::item("", 1, 8_000)]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!edited.has_billable_line_item());
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    for publish in [false, true, true] {
        ledger
            .invoices
            .create_invoice(TestDataFactory::simple_invoice(1_000, publish))
            .await
            .unwrap();
    }

    assert_eq!(ledger.invoices.list_invoices(None).await.unwrap().len(), 3);
    assert_eq!(
        ledger
            .invoices
            .list_invoices(Some(InvoiceStatus::Sent))
            .await
            .unwrap()
            .len(),
        2
    );
    assert!(ledger
        .invoices
        .list_invoices(Some(InvoiceStatus::Paid))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_payment_link_covers_amount_due() {
    let gateway = StubGateway::working();
    let ledger = ledger_with(gateway.clone());
    let invoice = ledger
        .invoices
        .create_invoice(TestDataFactory::reference_invoice(true))
        .await
        .unwrap();
    ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(4_900, Some("dep")))
        .await
        .unwrap();

    let linked = ledger
        .invoices
        .create_payment_link(&invoice.id, None)
        .await
        .unwrap();
    assert_eq!(
        linked.payment_link_url,
        Some(format!("https://pay.test/{}/40000", invoice.invoice_number))
    );
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_payment_link_refused_when_nothing_due() {
    let gateway = StubGateway::working();
    let ledger = ledger_with(gateway.clone());
    let invoice = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(3_000, true))
        .await
        .unwrap();
    ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(3_000, None))
        .await
        .unwrap();

    let err = ledger
        .invoices
        .create_payment_link(&invoice.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gateway_failure_leaves_invoice_unchanged() {
    let ledger = ledger_with(StubGateway::broken());
    let invoice = ledger
        .invoices
        .create_invoice(TestDataFactory::simple_invoice(3_000, true))
        .await
        .unwrap();

    let err = ledger
        .invoices
        .create_payment_link(&invoice.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));

    let stored = ledger.invoices.get_invoice(&invoice.id).await.unwrap();
    assert!(stored.payment_link_url.is_none());
    assert_eq!(stored.version, invoice.version);
    assert_eq!(stored.status, InvoiceStatus::Sent);
}

#[tokio::test]
async fn test_auto_pay_publish_attaches_link() {
    let gateway = StubGateway::working();
    let ledger = ledger_with(gateway.clone());
    let mut request = TestDataFactory::simple_invoice(6_000, true);
    request.auto_pay_enabled = true;

    let invoice = ledger.invoices.create_invoice(request).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Sent);
    assert!(invoice
        .payment_link_url
        .as_deref()
        .is_some_and(|url| url.ends_with("/6000")));
}

#[tokio::test]
async fn test_auto_pay_link_failure_does_not_block_publish() {
    let gateway = StubGateway::broken();
    let ledger = ledger_with(gateway.clone());
    let mut request = TestDataFactory::simple_invoice(6_000, false);
    request.auto_pay_enabled = true;
    let draft = ledger.invoices.create_invoice(request).await.unwrap();
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);

    let published = ledger.invoices.publish_invoice(&draft.id).await.unwrap();
    assert_eq!(published.status, InvoiceStatus::Sent);
    assert!(published.payment_link_url.is_none());
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
}
