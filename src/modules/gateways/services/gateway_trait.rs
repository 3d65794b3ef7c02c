use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{MinorUnits, Result};

/// Payment gateway boundary: hosted payment links out, completed payments in
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment page for the given amount
    async fn create_payment_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink>;

    /// Authenticate a webhook delivery and extract a completed payment from it.
    ///
    /// `Ok(None)` means the event is genuine but not a completed payment.
    /// A bad signature is `AppError::Unauthorized`.
    async fn verify_webhook(&self, signature: &str, payload: &str) -> Result<Option<PaymentCompleted>>;

    /// Get gateway name
    fn name(&self) -> &str;
}

/// Payment link request data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLinkRequest {
    pub invoice_id: String,

    /// Shown to the payer
    pub invoice_number: String,

    /// Amount in minor units
    pub amount: MinorUnits,

    pub customer_email: Option<String>,
}

/// Hosted payment page created by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    /// Gateway session reference
    pub gateway_reference: String,

    /// Payment URL for customer
    pub url: String,

    pub expires_at: Option<DateTime<Utc>>,
}

/// A payment the gateway reports as completed. Delivered at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    /// Deduplication key
    pub transaction_id: String,
    pub invoice_id: String,
    pub amount: MinorUnits,
}
