//! Rounding helpers shared by every valuation and rebalance computation.
//!
//! Aggregation always happens at full precision; these are applied only at
//! the point a value is emitted.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to two decimals, halves away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to whole currency units, halves away from zero.
pub fn round0(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// `part / whole * 100`, or zero when there is nothing to divide by.
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part / whole * Decimal::ONE_HUNDRED
}

/// Sum a sequence of decimals without intermediate rounding.
pub fn sum<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().fold(Decimal::ZERO, |acc, v| acc + v)
}
