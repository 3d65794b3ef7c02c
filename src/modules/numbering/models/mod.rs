pub mod counter;

pub use counter::{format_invoice_number, AssignedNumber, InvoiceNumberCounter};
