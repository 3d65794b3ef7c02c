pub mod sequencer;

pub use sequencer::{is_provisional_format, provisional_number, InvoiceNumberSequencer};
