//! Decimal currency helpers.
//!
//! All amounts are `rust_decimal::Decimal`; derived amounts (percentages,
//! prorations, overtime) are rounded to two places, half away from zero, so
//! the same inputs give the same cents on every caller.

use rust_decimal::prelude::*;

use crate::engine::error::PayrollError;

const DECIMAL_PLACES: u32 = 2;

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Stored amounts carry no sign of their own.
pub fn ensure_non_negative(value: Decimal, field_name: &str) -> Result<(), PayrollError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(PayrollError::Validation(format!(
            "{} must be non-negative, got {}",
            field_name, value
        )));
    }
    Ok(())
}
