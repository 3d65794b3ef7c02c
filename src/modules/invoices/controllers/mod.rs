pub mod invoice_controller;
pub mod sweep_controller;

use actix_web::web;

/// Invoice and sweep routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    invoice_controller::configure(cfg);
    sweep_controller::configure(cfg);
}
