use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use crate::modules::invoices::models::InvoiceStatus;
use crate::store::StoreError;

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Bad input, rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// A status change whose guard is not met. `to == None` is a deletion.
    #[error("Invalid transition from {from} to {}: {guard}", transition_target(.to))]
    InvalidTransition {
        from: InvoiceStatus,
        to: Option<InvoiceStatus>,
        guard: String,
    },

    /// Concurrent write won the race and internal retries ran out
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payment gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Webhook signature verification failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Document store timeouts, outages and corrupt documents
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

fn transition_target(to: &Option<InvoiceStatus>) -> String {
    match to {
        Some(status) => status.to_string(),
        None => "DELETED".to_string(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::Conflict { .. } => AppError::Conflict(err.to_string()),
            other => AppError::Store(other),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": error_message,
                "code": status_code.as_u16(),
                "kind": self.kind(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::Gateway(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn invalid_transition(
        from: InvoiceStatus,
        to: Option<InvoiceStatus>,
        guard: impl Into<String>,
    ) -> Self {
        AppError::InvalidTransition {
            from,
            to,
            guard: guard.into(),
        }
    }

    /// Stable machine-readable tag used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::Json(_) => "validation_error",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::Gateway(_) | AppError::HttpClient(_) => "gateway_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Store(_) => "store_unavailable",
            AppError::Configuration(_) | AppError::Internal(_) => "internal_error",
        }
    }

    /// Errors worth retrying later, as opposed to business rejections
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Conflict(_) | AppError::Store(_) | AppError::HttpClient(_)
        )
    }
}
