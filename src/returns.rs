//! Expected Returns
//!
//! Expected values are kept as [`Decimal`] minor units so that probabilities never
//! get rounded away before aggregation. Rounding only happens for display.

use decimal_percentage::Percentage;
use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::acceptance::Probability;

/// Errors that can occur while computing expected values.
#[derive(Debug, Error)]
pub enum ReturnsError {
    /// Decimal arithmetic overflowed or could not be converted back to minor units.
    #[error("expected value calculation overflowed")]
    Overflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Expected net return of offering `coupon` to a customer worth `cltv`:
/// `p * (cltv - coupon)` in minor units.
///
/// # Errors
///
/// Returns a [`ReturnsError`] on currency mismatch or overflow.
pub fn expected_return(
    probability: Probability,
    cltv: Money<'static, Currency>,
    coupon: Money<'static, Currency>,
) -> Result<Decimal, ReturnsError> {
    let net = cltv.sub(coupon)?.to_minor_units();

    probability
        .value()
        .checked_mul(Decimal::from(net))
        .ok_or(ReturnsError::Overflow)
}

/// Expected redemption cost of a coupon: `p * coupon` in minor units.
///
/// # Errors
///
/// Returns [`ReturnsError::Overflow`] if the multiplication overflows.
pub fn expected_cost(
    probability: Probability,
    coupon: Money<'static, Currency>,
) -> Result<Decimal, ReturnsError> {
    probability
        .value()
        .checked_mul(Decimal::from(coupon.to_minor_units()))
        .ok_or(ReturnsError::Overflow)
}

/// Calculate `percent` of a minor unit amount, rounding half away from zero.
///
/// # Errors
///
/// Returns [`ReturnsError::Overflow`] if the result does not fit in an `i64`.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, ReturnsError> {
    ((*percent) * Decimal::ONE) // decimal_percentage crate doesn't actually expose the underlying Decimal
        .checked_mul(Decimal::from(minor))
        .ok_or(ReturnsError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(ReturnsError::Overflow)
}

/// Round a fractional minor unit amount to [`Money`] for display.
///
/// # Errors
///
/// Returns [`ReturnsError::Overflow`] if the rounded amount does not fit in an `i64`.
pub fn to_money(
    minor: Decimal,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, ReturnsError> {
    let rounded = minor
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(ReturnsError::Overflow)?;

    Ok(Money::from_minor(rounded, currency))
}
