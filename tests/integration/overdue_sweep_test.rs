// Overdue sweep and scheduled release
//
// The sweep transitions SENT and PARTIALLY_PAID invoices past their due date
// with a balance outstanding. A failed write on one invoice does not hold up
// the rest, and the skipped invoice is picked up by the next run.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use helpers::*;
use ledgerbook::invoices::models::{Invoice, InvoiceStatus};
use ledgerbook::invoices::repositories::INVOICES;
use ledgerbook::store::{DocumentStore, MemoryStore};
use serde_json::json;

async fn sent_invoice_due_in(ledger: &ledgerbook::app::Ledger, days: i64, partial: bool) -> Invoice {
    let mut request = TestDataFactory::simple_invoice(10_000, true);
    request.due_date = Some(TestDataFactory::days_from_today(days));
    request.allow_partial_payments = partial;
    ledger.invoices.create_invoice(request).await.unwrap()
}

fn today() -> chrono::NaiveDate {
    Utc::now().date_naive()
}

#[tokio::test]
async fn test_yesterday_due_becomes_overdue() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = sent_invoice_due_in(&ledger, -1, false).await;

    let count = ledger.sweeper.run_at(today()).await.unwrap();

    assert_eq!(count, 1);
    let stored = ledger.invoices.get_invoice(&invoice.id).await.unwrap();
    assert_eq!(stored.status, InvoiceStatus::Overdue);
    assert_eq!(stored.amount_due, 10_000);
}

#[tokio::test]
async fn test_settled_and_future_invoices_untouched() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let paid = sent_invoice_due_in(&ledger, -1, false).await;
    ledger
        .payments
        .record(&paid.id, TestDataFactory::payment(10_000, None))
        .await
        .unwrap();
    let future = sent_invoice_due_in(&ledger, 5, false).await;

    assert_eq!(ledger.sweeper.run_at(today()).await.unwrap(), 0);

    assert_eq!(
        ledger.invoices.get_invoice(&paid.id).await.unwrap().status,
        InvoiceStatus::Paid
    );
    assert_eq!(
        ledger.invoices.get_invoice(&future.id).await.unwrap().status,
        InvoiceStatus::Sent
    );
}

#[tokio::test]
async fn test_partially_paid_past_due_becomes_overdue_and_stays_payable() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = sent_invoice_due_in(&ledger, -3, true).await;
    ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(4_000, None))
        .await
        .unwrap();

    assert_eq!(ledger.sweeper.run_at(today()).await.unwrap(), 1);

    let paid = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(6_000, None))
        .await
        .unwrap()
        .invoice;
    assert_eq!(paid.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_repeat_sweep_is_noop() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    sent_invoice_due_in(&ledger, -1, false).await;

    assert_eq!(ledger.sweeper.run_at(today()).await.unwrap(), 1);
    assert_eq!(ledger.sweeper.run_at(today()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_item_does_not_block_batch() {
    let store = FaultyStore::new();
    let ledger = ledger_over(store.shared());
    let stuck = sent_invoice_due_in(&ledger, -2, false).await;
    let others = [
        sent_invoice_due_in(&ledger, -2, false).await,
        sent_invoice_due_in(&ledger, -1, false).await,
    ];

    store.fail_batch_item(&stuck.id);
    assert_eq!(ledger.sweeper.run_at(today()).await.unwrap(), 2);
    for invoice in &others {
        assert_eq!(
            ledger.invoices.get_invoice(&invoice.id).await.unwrap().status,
            InvoiceStatus::Overdue
        );
    }
    assert_eq!(
        ledger.invoices.get_invoice(&stuck.id).await.unwrap().status,
        InvoiceStatus::Sent
    );

    // Picked up on the next tick
    store.clear_batch_failures();
    assert_eq!(ledger.sweeper.run_at(today()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unreadable_invoice_does_not_block_sweep() {
    let store = FaultyStore::new();
    let ledger = ledger_over(store.shared());
    let good = sent_invoice_due_in(&ledger, -1, false).await;
    let corrupt = sent_invoice_due_in(&ledger, -1, false).await;

    // A payment method this build does not know
    let doc = store.inner.get(INVOICES, &corrupt.id).await.unwrap();
    let mut body = doc.body;
    body["payments"] = json!([{
        "id": "legacy-1",
        "amount": 100,
        "method": "WIRE",
        "paidAt": Utc::now(),
        "note": null,
        "transactionId": "legacy-wire",
        "recordedBy": "import"
    }]);
    store
        .inner
        .update(INVOICES, &corrupt.id, doc.version, body)
        .await
        .unwrap();

    assert_eq!(ledger.sweeper.run_at(today()).await.unwrap(), 1);
    assert_eq!(
        ledger.invoices.get_invoice(&good.id).await.unwrap().status,
        InvoiceStatus::Overdue
    );

    let listed = ledger.invoices.list_invoices(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, good.id);
}

#[tokio::test]
async fn test_sweep_reports_store_outage() {
    let store = FaultyStore::new();
    let ledger = ledger_over(store.shared());
    sent_invoice_due_in(&ledger, -1, false).await;

    store.set_unavailable(true);
    assert!(ledger.sweeper.run_at(today()).await.is_err());

    // A scheduler tick survives the outage
    ledger.scheduler(Duration::from_secs(60)).tick().await;

    store.set_unavailable(false);
    assert_eq!(ledger.sweeper.run_at(today()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_scheduler_tick_releases_and_sweeps() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));

    let mut scheduled = TestDataFactory::simple_invoice(10_000, false);
    scheduled.scheduled_send_date = Some(TestDataFactory::days_from_today(2));
    let scheduled = ledger.invoices.create_invoice(scheduled).await.unwrap();
    let scheduled = ledger.invoices.publish_invoice(&scheduled.id).await.unwrap();
    assert_eq!(scheduled.status, InvoiceStatus::Scheduled);

    let overdue = sent_invoice_due_in(&ledger, -1, false).await;

    ledger.scheduler(Duration::from_secs(60)).tick().await;

    assert_eq!(
        ledger.invoices.get_invoice(&overdue.id).await.unwrap().status,
        InvoiceStatus::Overdue
    );
    // Send date still in the future
    assert_eq!(
        ledger.invoices.get_invoice(&scheduled.id).await.unwrap().status,
        InvoiceStatus::Scheduled
    );

    let released = ledger
        .sweeper
        .release_scheduled_at(TestDataFactory::days_from_today(2))
        .await
        .unwrap();
    assert_eq!(released, 1);
    let sent = ledger.invoices.get_invoice(&scheduled.id).await.unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);
    assert_eq!(sent.issue_date, Some(TestDataFactory::days_from_today(2)));
}
