pub mod gateways;
pub mod health;
pub mod invoices;
pub mod numbering;
pub mod payments;
