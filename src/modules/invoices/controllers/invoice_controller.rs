use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::core::error::AppError;
use crate::modules::invoices::models::{
    CreateInvoiceRequest, InvoiceResponse, InvoiceStatus, UpdateInvoiceRequest,
};
use crate::modules::invoices::services::invoice_service::InvoiceService;

/// Query parameters for listing invoices
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundInvoiceRequest {
    pub reason: String,
    pub recorded_by: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkBody {
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Create a new invoice
/// POST /invoices
pub async fn create_invoice(
    service: web::Data<Arc<InvoiceService>>,
    request: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.create_invoice(request.into_inner()).await?;

    Ok(HttpResponse::Created().json(InvoiceResponse::from(invoice)))
}

/// Get invoice by ID
/// GET /invoices/{id}
pub async fn get_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.get_invoice(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// List invoices, optionally by status
/// GET /invoices?status=OVERDUE
pub async fn list_invoices(
    service: web::Data<Arc<InvoiceService>>,
    query: web::Query<ListInvoicesQuery>,
) -> Result<HttpResponse, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<InvoiceStatus>)
        .transpose()
        .map_err(AppError::Validation)?;

    let invoices: Vec<InvoiceResponse> = service
        .list_invoices(status)
        .await?
        .into_iter()
        .map(InvoiceResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(invoices))
}

/// Edit a draft or scheduled invoice
/// PATCH /invoices/{id}
pub async fn update_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<UpdateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service
        .update_invoice(&path.into_inner(), request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// DELETE /invoices/{id}
pub async fn delete_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    service.delete_invoice(&path.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /invoices/{id}/publish
pub async fn publish_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.publish_invoice(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// POST /invoices/{id}/cancel
pub async fn cancel_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.cancel_invoice(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// POST /invoices/{id}/refund
pub async fn refund_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<RefundInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service
        .refund_invoice(&path.into_inner(), &request.reason, &request.recorded_by)
        .await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// Swap a provisional number for a sequential one
/// POST /invoices/{id}/renumber
pub async fn renumber_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.renumber_invoice(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// POST /invoices/{id}/payment-link
pub async fn create_payment_link(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    body: Option<web::Json<PaymentLinkBody>>,
) -> Result<HttpResponse, AppError> {
    let customer_email = body.and_then(|b| b.into_inner().customer_email);
    let invoice = service
        .create_payment_link(&path.into_inner(), customer_email)
        .await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// Configure invoice routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invoices")
            .route("", web::post().to(create_invoice))
            .route("", web::get().to(list_invoices))
            .route("/{id}", web::get().to(get_invoice))
            .route("/{id}", web::patch().to(update_invoice))
            .route("/{id}", web::delete().to(delete_invoice))
            .route("/{id}/publish", web::post().to(publish_invoice))
            .route("/{id}/cancel", web::post().to(cancel_invoice))
            .route("/{id}/refund", web::post().to(refund_invoice))
            .route("/{id}/renumber", web::post().to(renumber_invoice))
            .route("/{id}/payment-link", web::post().to(create_payment_link)),
    );
}
