use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::MinorUnits;

/// How a payment reached us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Card payment, usually reported by the gateway webhook
    Card,
    BankTransfer,
    Cash,
    Check,
    Other,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "CARD"),
            PaymentMethod::BankTransfer => write!(f, "BANK_TRANSFER"),
            PaymentMethod::Cash => write!(f, "CASH"),
            PaymentMethod::Check => write!(f, "CHECK"),
            PaymentMethod::Other => write!(f, "OTHER"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CARD" => Ok(PaymentMethod::Card),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "CASH" => Ok(PaymentMethod::Cash),
            "CHECK" => Ok(PaymentMethod::Check),
            "OTHER" => Ok(PaymentMethod::Other),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

/// A recorded payment. Immutable once appended to an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,

    /// Always positive
    pub amount: MinorUnits,

    pub method: PaymentMethod,

    pub paid_at: DateTime<Utc>,

    pub note: Option<String>,

    /// Gateway reference; the deduplication key for webhook replays
    pub transaction_id: Option<String>,

    /// User or system actor that recorded the payment
    pub recorded_by: String,
}

/// Manual payment entry from the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub amount: MinorUnits,
    pub method: PaymentMethod,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub recorded_by: String,
}
