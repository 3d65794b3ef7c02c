// Turns gateway webhook deliveries into recorded payments.
//
// Deliveries are at-least-once. A replay carries the same transaction id and
// is absorbed by the payment recorder's idempotency check. Business rejections
// (unknown invoice, overpayment, closed invoice) are acknowledged so the
// gateway stops redelivering, and logged at error level for follow-up.
// Transient failures are returned as errors so the gateway retries later.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::gateway_trait::{PaymentCompleted, PaymentGateway};
use crate::core::Result;
use crate::modules::invoices::models::InvoiceStatus;
use crate::modules::payments::models::{PaymentMethod, RecordPaymentRequest};
use crate::modules::payments::services::PaymentRecorder;

/// What happened to a webhook delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied {
        invoice_id: String,
        status: InvoiceStatus,
    },
    /// Transaction was already on the invoice
    Duplicate { invoice_id: String },
    /// Genuine event that is not a completed payment
    Ignored,
    /// Payment could not be applied; needs manual reconciliation
    Rejected { invoice_id: String, reason: String },
}

pub struct GatewayReconciler {
    gateway: Arc<dyn PaymentGateway>,
    recorder: Arc<PaymentRecorder>,
}

impl GatewayReconciler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, recorder: Arc<PaymentRecorder>) -> Self {
        Self { gateway, recorder }
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    /// Verify and apply one webhook delivery
    ///
    /// # Errors
    /// * `Unauthorized` - Signature check failed
    /// * Transient store errors, so the delivery is retried
    pub async fn handle_webhook(&self, signature: &str, payload: &str) -> Result<WebhookOutcome> {
        match self.gateway.verify_webhook(signature, payload).await? {
            Some(completed) => self.apply(completed).await,
            None => Ok(WebhookOutcome::Ignored),
        }
    }

    /// Record a completed gateway payment
    pub async fn apply(&self, completed: PaymentCompleted) -> Result<WebhookOutcome> {
        let request = RecordPaymentRequest {
            amount: completed.amount,
            method: PaymentMethod::Card,
            note: Some(format!("{} checkout", self.gateway.name())),
            transaction_id: Some(completed.transaction_id.clone()),
            recorded_by: format!("gateway:{}", self.gateway.name()),
        };

        match self.recorder.record(&completed.invoice_id, request).await {
            Ok(recorded) if recorded.duplicate => Ok(WebhookOutcome::Duplicate {
                invoice_id: completed.invoice_id,
            }),
            Ok(recorded) => {
                info!(
                    gateway = self.gateway.name(),
                    invoice_id = %completed.invoice_id,
                    transaction_id = %completed.transaction_id,
                    status = %recorded.invoice.status,
                    "Gateway payment applied"
                );
                Ok(WebhookOutcome::Applied {
                    invoice_id: completed.invoice_id,
                    status: recorded.invoice.status,
                })
            }
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                error!(
                    gateway = self.gateway.name(),
                    invoice_id = %completed.invoice_id,
                    transaction_id = %completed.transaction_id,
                    amount = completed.amount,
                    error = %e,
                    "Gateway payment could not be applied"
                );
                Ok(WebhookOutcome::Rejected {
                    invoice_id: completed.invoice_id,
                    reason: e.to_string(),
                })
            }
        }
    }
}
