pub mod models;
pub mod repositories;
pub mod services;

pub use models::AssignedNumber;
pub use services::InvoiceNumberSequencer;
