pub mod counter_repository;

pub use counter_repository::{CounterRepository, INVOICE_COUNTERS};
