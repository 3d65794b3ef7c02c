//! Ledgerbook invoice and payment ledger library
//!
//! Invoices with line items, tax and discounts; a status state machine; per-year
//! sequential numbering; idempotent payment recording; and a periodic overdue
//! sweep, all over a versioned document store.

pub mod app;
pub mod config;
pub mod core;
pub mod modules;
pub mod store;

// Re-export commonly used types
pub use modules::gateways;
pub use modules::invoices;
pub use modules::numbering;
pub use modules::payments;
