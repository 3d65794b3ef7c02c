use serde::{Deserialize, Serialize};

/// Invoice status lifecycle.
///
/// Persisted as SCREAMING_SNAKE_CASE. Deserialization rejects anything outside
/// this set, so an unknown status in the store surfaces as a malformed document
/// instead of flowing through the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Being prepared; line items, tax and discount may change
    Draft,

    /// Published with a future send date; still editable
    Scheduled,

    /// Issued to the client
    Sent,

    /// At least one payment applied, balance outstanding
    PartiallyPaid,

    /// Balance fully settled
    Paid,

    /// Past due date with a balance outstanding
    Overdue,

    Canceled,

    Refunded,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 8] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Scheduled,
        InvoiceStatus::Sent,
        InvoiceStatus::PartiallyPaid,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Canceled,
        InvoiceStatus::Refunded,
    ];

    /// Statuses that accept payments
    pub const PAYABLE: [InvoiceStatus; 4] = [
        InvoiceStatus::Sent,
        InvoiceStatus::Scheduled,
        InvoiceStatus::PartiallyPaid,
        InvoiceStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Scheduled => "SCHEDULED",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::PartiallyPaid => "PARTIALLY_PAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Canceled => "CANCELED",
            InvoiceStatus::Refunded => "REFUNDED",
        }
    }

    /// PAID counts as terminal until an explicit refund
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Paid | InvoiceStatus::Canceled | InvoiceStatus::Refunded
        )
    }

    pub fn is_payable(&self) -> bool {
        Self::PAYABLE.contains(self)
    }

    /// Header fields (line items, tax, discount, dates) may still change
    pub fn is_mutable(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Scheduled)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Invalid invoice status: {}", s))
    }
}
