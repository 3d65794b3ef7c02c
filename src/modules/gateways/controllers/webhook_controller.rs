use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use tracing::info;

use crate::core::{AppError, Result};
use crate::modules::gateways::services::GatewayReconciler;

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Receive a Stripe webhook
/// POST /webhooks/stripe
///
/// The raw body is needed for signature verification, so it is taken as bytes.
///
/// # Returns
/// * `200 OK` - Applied, duplicate, ignored, or rejected for manual follow-up
/// * `401 Unauthorized` - Signature check failed
/// * `503 Service Unavailable` - Store trouble; the gateway should redeliver
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    reconciler: web::Data<Arc<GatewayReconciler>>,
) -> Result<HttpResponse> {
    let signature = req
        .headers()
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Stripe-Signature header".to_string()))?;

    let payload = std::str::from_utf8(&body)
        .map_err(|_| AppError::validation("Webhook body is not valid UTF-8"))?;

    let outcome = reconciler.handle_webhook(signature, payload).await?;
    info!(
        gateway = reconciler.gateway_name(),
        outcome = ?outcome,
        "Webhook processed"
    );

    Ok(HttpResponse::Ok().json(outcome))
}

/// Configure webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").route("/stripe", web::post().to(stripe_webhook)));
}
