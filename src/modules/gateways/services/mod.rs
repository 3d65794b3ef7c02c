pub mod gateway_trait;
pub mod reconciliation;
pub mod stripe;

pub use gateway_trait::{PaymentCompleted, PaymentGateway, PaymentLink, PaymentLinkRequest};
pub use reconciliation::{GatewayReconciler, WebhookOutcome};
pub use stripe::StripeGateway;
