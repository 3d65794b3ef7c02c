//! Integer minor-unit money helpers.
//!
//! Amounts are `i64` minor units (cents) everywhere in the ledger. Decimal
//! arithmetic only appears when a rate is applied, and the result is rounded
//! back to whole minor units straight away.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::core::{AppError, Result};

/// Amount in minor currency units
pub type MinorUnits = i64;

/// Apply a decimal rate to an amount, rounding half-up to whole minor units.
///
/// Inputs are non-negative, so `MidpointAwayFromZero` is exactly round-half-up:
/// 2.5 becomes 3, 2.4999 becomes 2.
pub fn apply_rate(amount: MinorUnits, rate: Decimal) -> Result<MinorUnits> {
    let scaled = Decimal::from(amount)
        .checked_mul(rate)
        .ok_or_else(|| AppError::validation("Amount overflows when applying rate"))?;

    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::validation("Rounded amount does not fit in minor units"))
}

/// Render minor units with two decimal places, e.g. `44900` as `449.00`
pub fn format_minor_units(amount: MinorUnits) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

pub fn ensure_non_negative(amount: MinorUnits, what: &str) -> Result<()> {
    if amount < 0 {
        return Err(AppError::validation(format!(
            "{} must be non-negative, got: {}",
            what, amount
        )));
    }
    Ok(())
}
