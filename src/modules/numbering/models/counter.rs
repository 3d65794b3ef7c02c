use serde::{Deserialize, Serialize};

/// Per-year invoice sequence. The only document the sequencer mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceNumberCounter {
    pub year: i32,
    pub last_sequence: u32,
}

impl InvoiceNumberCounter {
    pub fn first(year: i32) -> Self {
        Self {
            year,
            last_sequence: 1,
        }
    }

    pub fn advanced(self) -> Option<Self> {
        Some(Self {
            year: self.year,
            last_sequence: self.last_sequence.checked_add(1)?,
        })
    }
}

/// A number handed out for a new invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedNumber {
    pub value: String,
    /// True when issued by the fallback path instead of the counter
    pub provisional: bool,
}

/// `INV-<year>-NNNN`, zero-padded to four digits. Sequences past 9999 keep
/// growing in width rather than wrapping.
pub fn format_invoice_number(year: i32, sequence: u32) -> String {
    format!("INV-{}-{:04}", year, sequence)
}
