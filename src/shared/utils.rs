//! Utility functions and helpers

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::shared::errors::PriceError;

/// Calculate percentage change from `old_value` to `new_value`.
/// A zero baseline has no defined change, and a ratio too large for
/// `Decimal` is reported instead of panicking.
pub fn calculate_percentage_change(
    old_value: Decimal,
    new_value: Decimal,
) -> Result<Decimal, PriceError> {
    if old_value.is_zero() {
        return Err(PriceError::DegenerateBaseline);
    }
    new_value
        .checked_sub(old_value)
        .and_then(|delta| delta.checked_div(old_value))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or(PriceError::Overflow(old_value, new_value))
}

/// Round a percentage to one decimal place for display
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Generate unique ID
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}
