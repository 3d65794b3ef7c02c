use rust_decimal::Decimal;

use crate::core::money::{apply_rate, ensure_non_negative};
use crate::core::{AppError, MinorUnits, Result};
use crate::modules::invoices::models::LineItem;

/// Maximum decimal places accepted on a tax rate (e.g. 0.0725)
const MAX_TAX_RATE_SCALE: u32 = 4;

/// Derived money fields of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: MinorUnits,
    pub tax_amount: MinorUnits,
    pub total_amount: MinorUnits,
}

/// Pure totals arithmetic over integer minor units
pub struct TotalsCalculator;

impl TotalsCalculator {
    /// subtotal = Σ quantity × unit_price
    /// tax      = round_half_up(subtotal × tax_rate)
    /// total    = max(0, subtotal + tax − discount)
    pub fn calculate(
        line_items: &[LineItem],
        tax_rate: Decimal,
        discount_amount: MinorUnits,
    ) -> Result<Totals> {
        Self::validate_tax_rate(tax_rate)?;
        ensure_non_negative(discount_amount, "Discount amount")?;

        let subtotal = line_items.iter().try_fold(0 as MinorUnits, |acc, item| {
            acc.checked_add(item.total_price)
                .ok_or_else(|| AppError::validation("Invoice subtotal overflows"))
        })?;

        let tax_amount = Self::calculate_tax(subtotal, tax_rate)?;

        let gross = subtotal
            .checked_add(tax_amount)
            .ok_or_else(|| AppError::validation("Invoice total overflows"))?;
        let total_amount = (gross - discount_amount).max(0);

        Ok(Totals {
            subtotal,
            tax_amount,
            total_amount,
        })
    }

    /// Tax on a subtotal, rounded half-up to whole minor units
    pub fn calculate_tax(subtotal: MinorUnits, tax_rate: Decimal) -> Result<MinorUnits> {
        apply_rate(subtotal, tax_rate)
    }

    /// 0 <= tax_rate < 1, at most four decimal places
    pub fn validate_tax_rate(tax_rate: Decimal) -> Result<()> {
        if tax_rate < Decimal::ZERO {
            return Err(AppError::Validation(
                "Tax rate cannot be negative".to_string(),
            ));
        }

        if tax_rate >= Decimal::ONE {
            return Err(AppError::Validation(
                "Tax rate must be below 1.0 (100%)".to_string(),
            ));
        }

        if tax_rate.normalize().scale() > MAX_TAX_RATE_SCALE {
            return Err(AppError::Validation(format!(
                "Tax rate cannot have more than {} decimal places",
                MAX_TAX_RATE_SCALE
            )));
        }

        Ok(())
    }
}
