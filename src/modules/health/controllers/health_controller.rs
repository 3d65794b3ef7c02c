use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::store::{DocumentStore, StoreError};

/// Health check response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub store: String,
    pub application: String,
}

/// GET /health - Liveness and store reachability
///
/// Any answer from the store, including "not found" for the probe key, counts
/// as reachable. Timeouts and outages report 503.
pub async fn health_check(store: web::Data<Arc<dyn DocumentStore>>) -> impl Responder {
    let store_status = match store.get("health", "probe").await {
        Ok(_) | Err(StoreError::NotFound { .. }) => "healthy".to_string(),
        Err(e) => {
            tracing::error!(error = %e, "Store health check failed");
            "unavailable".to_string()
        }
    };
    let healthy = store_status == "healthy";

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: HealthChecks {
            store: store_status,
            application: "healthy".to_string(),
        },
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// Configure health check routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
