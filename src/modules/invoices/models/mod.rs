mod invoice;
mod line_item;
mod status;

pub use invoice::{CreateInvoiceRequest, Invoice, InvoiceResponse, UpdateInvoiceRequest};
pub use line_item::{build_line_items, LineItem, LineItemInput};
pub use status::InvoiceStatus;
