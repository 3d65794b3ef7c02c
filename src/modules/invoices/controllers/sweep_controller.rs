use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::core::error::AppError;
use crate::modules::invoices::services::OverdueSweeper;

#[derive(Debug, Default, Deserialize)]
pub struct SweepQuery {
    /// Defaults to the current UTC date
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

/// Run the overdue sweep on demand
/// POST /sweeps/overdue
pub async fn run_overdue_sweep(
    sweeper: web::Data<Arc<OverdueSweeper>>,
    query: web::Query<SweepQuery>,
) -> Result<HttpResponse, AppError> {
    let today = query.today.unwrap_or_else(|| Utc::now().date_naive());
    let transitioned = sweeper.run_at(today).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "today": today,
        "transitioned": transitioned,
    })))
}

/// Configure sweep routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/sweeps").route("/overdue", web::post().to(run_overdue_sweep)));
}
