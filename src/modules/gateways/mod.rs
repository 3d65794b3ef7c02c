pub mod controllers;
pub mod services;

pub use controllers::configure;
pub use services::{
    GatewayReconciler, PaymentCompleted, PaymentGateway, PaymentLink, PaymentLinkRequest,
    StripeGateway, WebhookOutcome,
};
