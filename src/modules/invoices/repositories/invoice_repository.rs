// Invoice persistence over the document store.
//
// Every mutation is a read-modify-write conditioned on the version that was
// read. On a lost race the document is re-read and the caller's closure runs
// again against the fresh state, up to `retry_limit` times, before a
// `Conflict` is surfaced.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};
use crate::store::{BatchWrite, Document, DocumentStore, FieldOp, StoreError};

pub const INVOICES: &str = "invoices";

/// Outcome of a [`InvoiceRepository::modify`] closure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Persist the modified invoice
    Write,
    /// Leave the stored document as it is
    Skip,
}

/// Repository for invoice documents
pub struct InvoiceRepository {
    store: Arc<dyn DocumentStore>,
    retry_limit: u32,
}

impl InvoiceRepository {
    pub fn new(store: Arc<dyn DocumentStore>, retry_limit: u32) -> Self {
        Self {
            store,
            retry_limit: retry_limit.max(1),
        }
    }

    /// Persist a new invoice; the returned copy carries its store id and version
    pub async fn create(&self, invoice: &Invoice) -> Result<Invoice> {
        let id = self.store.create(INVOICES, to_body(invoice)?).await?;

        let mut created = invoice.clone();
        created.id = id;
        created.version = 1;
        Ok(created)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>> {
        match self.store.get(INVOICES, id).await {
            Ok(doc) => Ok(Some(from_document(doc)?)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Invoice> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", id)))
    }

    /// Invoices whose status is one of `statuses`
    pub async fn find_by_statuses(&self, statuses: &[InvoiceStatus]) -> Result<Vec<Invoice>> {
        let docs = self
            .store
            .query_by_field(INVOICES, "status", FieldOp::In, json!(statuses))
            .await?;
        let mut invoices = decode_readable(docs);
        invoices.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(invoices)
    }

    pub async fn list(&self, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>> {
        match status {
            Some(status) => self.find_by_statuses(&[status]).await,
            None => self.find_by_statuses(&InvoiceStatus::ALL).await,
        }
    }

    pub async fn find_provisional(&self) -> Result<Vec<Invoice>> {
        let docs = self
            .store
            .query_by_field(INVOICES, "provisionalNumber", FieldOp::Eq, json!(true))
            .await?;
        Ok(decode_readable(docs))
    }

    /// Optimistic read-modify-write.
    ///
    /// `apply` sees the freshly read invoice and may run more than once. It
    /// returns `Mutation::Skip` to leave the document untouched. Returns the
    /// resulting invoice and whether it was written.
    pub async fn modify<F>(&self, id: &str, mut apply: F) -> Result<(Invoice, bool)>
    where
        F: FnMut(&mut Invoice) -> Result<Mutation> + Send,
    {
        for attempt in 1..=self.retry_limit {
            let mut invoice = self.get(id).await?;

            if apply(&mut invoice)? == Mutation::Skip {
                return Ok((invoice, false));
            }

            match self
                .store
                .update(INVOICES, id, invoice.version, to_body(&invoice)?)
                .await
            {
                Ok(version) => {
                    invoice.version = version;
                    return Ok((invoice, true));
                }
                Err(StoreError::Conflict { .. }) => {
                    debug!(invoice_id = %id, attempt, "Concurrent invoice write, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(invoice_id = %id, attempts = self.retry_limit, "Giving up after repeated write conflicts");
        Err(AppError::Conflict(format!(
            "Invoice '{}' changed concurrently {} times; retry with fresh state",
            id, self.retry_limit
        )))
    }

    /// Hard delete, conditioned on the version `check` approved.
    ///
    /// On a lost race the invoice is re-read and `check` runs again against
    /// the fresh state, up to `retry_limit` times. Returns the deleted invoice.
    pub async fn delete_checked<F>(&self, id: &str, check: F) -> Result<Invoice>
    where
        F: Fn(&Invoice) -> Result<()> + Send,
    {
        for attempt in 1..=self.retry_limit {
            let invoice = self.get(id).await?;
            check(&invoice)?;

            match self.store.delete(INVOICES, id, invoice.version).await {
                Ok(()) => return Ok(invoice),
                Err(StoreError::Conflict { .. }) => {
                    debug!(invoice_id = %id, attempt, "Concurrent invoice write during delete, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(invoice_id = %id, attempts = self.retry_limit, "Giving up delete after repeated write conflicts");
        Err(AppError::Conflict(format!(
            "Invoice '{}' changed concurrently {} times; retry with fresh state",
            id, self.retry_limit
        )))
    }

    /// Write several already-modified invoices, each conditioned on the version
    /// it was read at. Results line up with the input order.
    pub async fn write_batch(&self, invoices: Vec<Invoice>) -> Result<Vec<Result<Invoice>>> {
        let writes = invoices
            .iter()
            .map(|invoice| {
                Ok(BatchWrite {
                    collection: INVOICES.to_string(),
                    id: invoice.id.clone(),
                    expected_version: invoice.version,
                    body: to_body(invoice)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let outcomes = self.store.atomic_batch(writes).await?;
        if outcomes.len() != invoices.len() {
            return Err(AppError::internal(format!(
                "Batch returned {} results for {} writes",
                outcomes.len(),
                invoices.len()
            )));
        }

        Ok(invoices
            .into_iter()
            .zip(outcomes)
            .map(|(mut invoice, outcome)| {
                let version = outcome?;
                invoice.version = version;
                Ok(invoice)
            })
            .collect())
    }
}

fn to_body(invoice: &Invoice) -> Result<Value> {
    Ok(serde_json::to_value(invoice)?)
}

/// Decode query results, leaving out documents this build cannot read so one
/// bad invoice does not hide the rest
fn decode_readable(docs: Vec<Document>) -> Vec<Invoice> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match from_document(doc) {
                Ok(invoice) => Some(invoice),
                Err(e) => {
                    warn!(invoice_id = %id, error = %e, "Skipping unreadable invoice document");
                    None
                }
            }
        })
        .collect()
}

fn from_document(doc: Document) -> Result<Invoice> {
    let mut invoice: Invoice = serde_json::from_value(doc.body).map_err(|e| {
        AppError::Store(StoreError::Malformed(format!("invoice {}: {}", doc.id, e)))
    })?;
    invoice.id = doc.id;
    invoice.version = doc.version;
    Ok(invoice)
}
