// End-to-end payment recording
//
// Covers the reference scenarios (full, partial, overpayment), idempotent
// replay by transaction id, and concurrent payments racing on one invoice.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;

use helpers::*;
use ledgerbook::core::AppError;
use ledgerbook::invoices::models::{Invoice, InvoiceStatus};
use ledgerbook::invoices::repositories::INVOICES;
use ledgerbook::store::{DocumentStore, MemoryStore};

async fn published_reference(ledger: &ledgerbook::app::Ledger, partial: bool) -> Invoice {
    ledger
        .invoices
        .create_invoice(TestDataFactory::reference_invoice(partial))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_single_full_payment() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = published_reference(&ledger, false).await;

    assert_eq!(invoice.status, InvoiceStatus::Sent);
    assert_eq!(invoice.subtotal, 42_500);
    assert_eq!(invoice.tax_amount, 3_400);
    assert_eq!(invoice.total_amount, 44_900);

    let recorded = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(44_900, None))
        .await
        .unwrap();

    assert_eq!(recorded.invoice.status, InvoiceStatus::Paid);
    assert_eq!(recorded.invoice.amount_due, 0);
    assert!(recorded.invoice.paid_at.is_some());
    assert!(recorded.invoice.is_balanced());
}

#[tokio::test]
async fn test_partial_then_final_payment() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = published_reference(&ledger, true).await;

    let first = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(20_000, None))
        .await
        .unwrap()
        .invoice;
    assert_eq!(first.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(first.amount_due, 24_900);
    assert!(first.paid_at.is_none());

    let second = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(24_900, None))
        .await
        .unwrap()
        .invoice;
    assert_eq!(second.status, InvoiceStatus::Paid);
    assert_eq!(second.amount_paid, 44_900);
    assert_eq!(second.payments.len(), 2);
    assert!(second.is_balanced());
}

#[tokio::test]
async fn test_overpayment_rejected_unchanged() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = published_reference(&ledger, true).await;

    let err = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(50_000, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let stored = ledger.invoices.get_invoice(&invoice.id).await.unwrap();
    assert_eq!(stored, invoice);
}

#[tokio::test]
async fn test_partial_payment_without_flag_rejected() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = published_reference(&ledger, false).await;

    let err = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(20_000, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let stored = ledger.invoices.get_invoice(&invoice.id).await.unwrap();
    assert_eq!(stored.amount_paid, 0);
    assert!(stored.payments.is_empty());
}

#[tokio::test]
async fn test_replayed_gateway_payment_is_not_double_counted() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = published_reference(&ledger, true).await;

    let first = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(10_000, Some("pi_replay")))
        .await
        .unwrap();
    let replay = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(10_000, Some("pi_replay")))
        .await
        .unwrap();

    assert!(!first.duplicate);
    assert!(replay.duplicate);
    assert_eq!(replay.invoice.amount_paid, 10_000);
    assert_eq!(replay.invoice.version, first.invoice.version);
}

#[tokio::test]
async fn test_replay_after_paid_is_still_success() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let invoice = published_reference(&ledger, false).await;

    ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(44_900, Some("pi_full")))
        .await
        .unwrap();
    let replay = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(44_900, Some("pi_full")))
        .await
        .unwrap();

    assert!(replay.duplicate);
    assert_eq!(replay.invoice.status, InvoiceStatus::Paid);
    assert_eq!(replay.invoice.amount_paid, 44_900);
}

#[tokio::test]
async fn test_payment_on_missing_invoice() {
    let ledger = ledger_over(Arc::new(MemoryStore::new()));
    let err = ledger
        .payments
        .record("no-such-invoice", TestDataFactory::payment(100, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_payment_retries_through_conflicts() {
    let store = FaultyStore::new();
    let ledger = ledger_over(store.shared());
    let invoice = published_reference(&ledger, false).await;

    store.inject_conflicts(INVOICES, 2);
    let recorded = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(44_900, None))
        .await
        .unwrap();

    assert_eq!(recorded.invoice.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_exhausted_retries_surface_conflict() {
    let store = FaultyStore::new();
    let ledger = ledger_over(store.shared());
    let invoice = published_reference(&ledger, false).await;

    store.inject_conflicts(INVOICES, 100);
    let err = ledger
        .payments
        .record(&invoice.id, TestDataFactory::payment(44_900, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    store.inject_conflicts(INVOICES, 0);
    let stored = ledger.invoices.get_invoice(&invoice.id).await.unwrap();
    assert_eq!(stored.amount_paid, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_are_both_applied() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let ledger = ledger_over(store);
    let invoice = published_reference(&ledger, true).await;

    let amounts = [10_000, 10_000, 10_000, 14_900];
    let handles: Vec<_> = amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| {
            let payments = ledger.payments.clone();
            let id = invoice.id.clone();
            let txn = format!("pi_concurrent_{}", i);
            let amount = *amount;
            tokio::spawn(async move {
                payments
                    .record(&id, TestDataFactory::payment(amount, Some(&txn)))
                    .await
            })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            applied += 1;
        }
    }

    let stored = ledger.invoices.get_invoice(&invoice.id).await.unwrap();
    assert!(stored.is_balanced());
    assert_eq!(stored.payments.len(), applied);
    assert_eq!(
        stored.amount_paid,
        stored.payments.iter().map(|p| p.amount).sum::<i64>()
    );
    if applied == amounts.len() {
        assert_eq!(stored.status, InvoiceStatus::Paid);
    }
}
