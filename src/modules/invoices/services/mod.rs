pub mod invoice_service;
pub mod overdue_sweeper;
pub mod scheduler;
pub mod status_engine;
pub mod totals_calculator;

pub use invoice_service::InvoiceService;
pub use overdue_sweeper::OverdueSweeper;
pub use scheduler::LedgerScheduler;
pub use status_engine::{StatusEngine, StatusTrigger};
pub use totals_calculator::{Totals, TotalsCalculator};
