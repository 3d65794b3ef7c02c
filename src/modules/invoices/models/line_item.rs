// A line item is one billed product or service. Its total is
// quantity × unit_price in minor units and is recomputed whenever the item is
// rebuilt, never edited directly.

use serde::{Deserialize, Serialize};

use crate::core::money::ensure_non_negative;
use crate::core::{AppError, MinorUnits, Result};

const MAX_DESCRIPTION_LEN: usize = 255;

/// Represents a single line item in an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Description of the product or service
    pub description: String,

    /// Quantity of items
    pub quantity: u32,

    /// Price per unit, minor units
    pub unit_price: MinorUnits,

    /// quantity × unit_price
    pub total_price: MinorUnits,
}

/// Caller-supplied line item, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    pub description: String,
    pub quantity: u32,
    pub unit_price: MinorUnits,
}

impl LineItem {
    /// Create a new line item with validation.
    ///
    /// Drafts may carry incomplete rows (blank description, zero quantity);
    /// [`LineItem::is_billable`] decides whether a row counts when publishing.
    pub fn new(description: String, quantity: u32, unit_price: MinorUnits) -> Result<Self> {
        Self::validate_description(&description)?;
        ensure_non_negative(unit_price, "Unit price")?;

        let total_price = MinorUnits::from(quantity)
            .checked_mul(unit_price)
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Line item total overflows: {} x {}",
                    quantity, unit_price
                ))
            })?;

        Ok(Self {
            description,
            quantity,
            unit_price,
            total_price,
        })
    }

    /// Non-blank description and a positive total
    pub fn is_billable(&self) -> bool {
        !self.description.trim().is_empty() && self.total_price > 0
    }

    fn validate_description(description: &str) -> Result<()> {
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::validation(format!(
                "Line item description cannot exceed {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        Ok(())
    }
}

impl TryFrom<LineItemInput> for LineItem {
    type Error = AppError;

    fn try_from(input: LineItemInput) -> Result<Self> {
        LineItem::new(input.description, input.quantity, input.unit_price)
    }
}

/// Validate and convert a batch of inputs, keeping their order
pub fn build_line_items(inputs: Vec<LineItemInput>) -> Result<Vec<LineItem>> {
    inputs.into_iter().map(LineItem::try_from).collect()
}
