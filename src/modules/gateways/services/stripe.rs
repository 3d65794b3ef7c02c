use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, warn};

use super::gateway_trait::{PaymentCompleted, PaymentGateway, PaymentLink, PaymentLinkRequest};
use crate::config::GatewayConfig;
use crate::core::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Event types that carry a settled checkout session
const COMPLETED_EVENTS: [&str; 2] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

/// Stripe Checkout client
pub struct StripeGateway {
    client: ClientWithMiddleware,
    secret_key: String,
    webhook_secret: String,
    base_url: String,
    success_url: String,
    cancel_url: String,
    currency: String,
    tolerance_secs: i64,
}

#[derive(Deserialize)]
struct CheckoutSession {
    id: String,
    url: Option<String>,
    expires_at: Option<i64>,
}

#[derive(Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Deserialize)]
struct StripeEventData {
    object: CheckoutSessionObject,
}

#[derive(Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

impl StripeGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            currency: config.currency.clone(),
            tolerance_secs: config.signature_tolerance_secs,
        }
    }

    /// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`)
    /// against the raw payload at the given time
    pub fn verify_signature_at(&self, header: &str, payload: &str, now: i64) -> Result<()> {
        let mut timestamp: Option<i64> = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| AppError::Unauthorized("Missing signature timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(AppError::Unauthorized("Missing v1 signature".to_string()));
        }

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(AppError::Unauthorized(format!(
                "Signature timestamp outside tolerance of {}s",
                self.tolerance_secs
            )));
        }

        let signed_payload = format!("{}.{}", timestamp, payload);
        let valid = signatures.iter().any(|candidate| {
            let Ok(expected) = hex::decode(candidate) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
                return false;
            };
            mac.update(signed_payload.as_bytes());
            mac.verify_slice(&expected).is_ok()
        });

        if !valid {
            return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
        }
        Ok(())
    }

    /// Extract a completed payment from a verified event body
    pub fn parse_event(payload: &str) -> Result<Option<PaymentCompleted>> {
        let event: StripeEvent = serde_json::from_str(payload)
            .map_err(|e| AppError::Validation(format!("Invalid webhook payload: {}", e)))?;

        if !COMPLETED_EVENTS.contains(&event.event_type.as_str()) {
            debug!(event_type = %event.event_type, "Ignoring Stripe event");
            return Ok(None);
        }

        let session = event.data.object;
        if session.payment_status.as_deref() != Some("paid") {
            debug!(session_id = %session.id, "Checkout session not paid yet");
            return Ok(None);
        }

        // A paid session we cannot attribute is acknowledged, not bounced back
        // for redelivery; it needs manual follow-up
        let invoice_id = session
            .metadata
            .get("invoice_id")
            .cloned()
            .or(session.client_reference_id);
        let (Some(invoice_id), Some(amount)) = (invoice_id, session.amount_total) else {
            error!(
                session_id = %session.id,
                payment_intent = ?session.payment_intent,
                "Paid checkout session carries no invoice reference or amount"
            );
            return Ok(None);
        };

        Ok(Some(PaymentCompleted {
            transaction_id: session.payment_intent.unwrap_or(session.id),
            invoice_id,
            amount,
        }))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink> {
        // Stripe Checkout Sessions API: https://stripe.com/docs/api/checkout/sessions/create
        let url = format!("{}/v1/checkout/sessions", self.base_url);

        let mut form = vec![
            ("mode", "payment".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("client_reference_id", request.invoice_id.clone()),
            ("metadata[invoice_id]", request.invoice_id.clone()),
            ("metadata[invoice_number]", request.invoice_number.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.currency.clone()),
            ("line_items[0][price_data][unit_amount]", request.amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                format!("Invoice {}", request.invoice_number),
            ),
        ];
        if let Some(email) = &request.customer_email {
            form.push(("customer_email", email.clone()));
        }

        // Same invoice and amount reuse the session across retries
        let idempotency_key = format!("{}-{}", request.invoice_id, request.amount);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            warn!(%status, invoice_id = %request.invoice_id, "Stripe rejected checkout session");
            return Err(AppError::Gateway(format!(
                "Stripe API error {}: {}",
                status, error_body
            )));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse Stripe response: {}", e)))?;

        let url = session.url.ok_or_else(|| {
            AppError::Gateway(format!("Checkout session {} has no URL", session.id))
        })?;

        Ok(PaymentLink {
            gateway_reference: session.id,
            url,
            expires_at: session
                .expires_at
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        })
    }

    async fn verify_webhook(&self, signature: &str, payload: &str) -> Result<Option<PaymentCompleted>> {
        self.verify_signature_at(signature, payload, Utc::now().timestamp())?;
        Self::parse_event(payload)
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
