use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::error::AppError;
use crate::modules::invoices::models::InvoiceResponse;
use crate::modules::payments::models::RecordPaymentRequest;
use crate::modules::payments::services::PaymentRecorder;

/// Record a payment against an invoice
/// POST /invoices/{id}/payments
///
/// A replayed `transactionId` returns the invoice unchanged with 200.
pub async fn record_payment(
    recorder: web::Data<Arc<PaymentRecorder>>,
    path: web::Path<String>,
    request: web::Json<RecordPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let recorded = recorder
        .record(&path.into_inner(), request.into_inner())
        .await?;

    let body = InvoiceResponse::from(recorded.invoice);
    if recorded.duplicate {
        Ok(HttpResponse::Ok().json(body))
    } else {
        Ok(HttpResponse::Created().json(body))
    }
}

/// Configure payment routes.
///
/// Registered as a plain resource so it can sit before the `/invoices` scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/invoices/{id}/payments").route(web::post().to(record_payment)),
    );
}
