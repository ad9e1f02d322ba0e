//! # Money
//!
//! Amounts in integer cents.
//!
//! ## Integer Cents, Fractional Costs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every amount that is charged or paid is stored as integer cents:      │
//! │    sale totals, purchase line totals, waste value, summary revenue     │
//! │                                                                         │
//! │  Per-unit ingredient costs are NOT amounts. 3.20 per kg of flour used  │
//! │  at 0.125 kg per portion is 40 cents, but 3.20 per 1000 g is 0.32      │
//! │  cents per gram. Those intermediate costs stay as f64 cents and are    │
//! │  rounded exactly once, when they become an amount (`from_cost`).       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use galley_core::money::Money;
//!
//! let price = Money::from_cents(1250); // 12.50
//! let total = price.times(3.0);        // 37.50
//! assert_eq!(total.cents(), 3750);
//!
//! // A glass is a sixth of the bottle price
//! let glass = Money::from_cents(2400).scale(1.0 / 6.0);
//! assert_eq!(glass.cents(), 400);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::MAX_AMOUNT_CENTS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that reversals and negative gross profit are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use galley_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Rounds a fractional cent cost to an amount (half away from zero).
    ///
    /// Non-finite input yields zero; callers validate before reaching here.
    ///
    /// ```rust
    /// use galley_core::money::Money;
    ///
    /// assert_eq!(Money::from_cost(40.5).cents(), 41);
    /// assert_eq!(Money::from_cost(-0.4).cents(), 0);
    /// ```
    pub fn from_cost(cents: f64) -> Self {
        if !cents.is_finite() {
            return Money::zero();
        }
        Money(cents.round() as i64)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the value in cents as `f64`, for cost ratios.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    /// Whole currency units, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Clamps negative values to zero.
    ///
    /// Used when a reversal subtracts from an accumulator.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Multiplies a unit price by a (possibly fractional) quantity.
    ///
    /// ```rust
    /// use galley_core::money::Money;
    ///
    /// // 0.5 kg at 3.20 per kg
    /// assert_eq!(Money::from_cents(320).times(0.5).cents(), 160);
    /// ```
    pub fn times(&self, quantity: f64) -> Money {
        Money::from_cost(self.0 as f64 * quantity)
    }

    /// Scales by a variant price factor.
    #[inline]
    pub fn scale(&self, factor: f64) -> Money {
        self.times(factor)
    }

    /// Divides an amount by a quantity, giving a unit price.
    ///
    /// Returns zero for a zero or non-finite quantity.
    pub fn per(&self, quantity: f64) -> Money {
        if !quantity.is_finite() || quantity == 0.0 {
            return Money::zero();
        }
        Money::from_cost(self.0 as f64 / quantity)
    }

    /// [`times`](Money::times), or `None` when the result would leave
    /// ±[`MAX_AMOUNT_CENTS`].
    ///
    /// ```rust
    /// use galley_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(320).checked_times(0.5), Some(Money::from_cents(160)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_times(2.0), None);
    /// ```
    pub fn checked_times(&self, quantity: f64) -> Option<Money> {
        let cost = self.0 as f64 * quantity;
        if !cost.is_finite() || cost.abs() > MAX_AMOUNT_CENTS as f64 {
            return None;
        }
        Some(Money::from_cost(cost))
    }

    /// Sum of two amounts, or `None` when it would leave ±[`MAX_AMOUNT_CENTS`].
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0
            .checked_add(other.0)
            .filter(|c| c.unsigned_abs() <= MAX_AMOUNT_CENTS as u64)
            .map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `major.minor` without a currency symbol.
///
/// Tenants price in different currencies; symbols belong to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_times_rounds_half_away_from_zero() {
        assert_eq!(Money::from_cents(333).times(1.5).cents(), 500); // 499.5
        assert_eq!(Money::from_cents(-333).times(1.5).cents(), -500);
        assert_eq!(Money::from_cents(250).times(0.0).cents(), 0);
    }

    #[test]
    fn test_from_cost_ignores_non_finite() {
        assert_eq!(Money::from_cost(f64::NAN), Money::zero());
        assert_eq!(Money::from_cost(f64::INFINITY), Money::zero());
    }

    #[test]
    fn test_per_unit() {
        let total = Money::from_cents(1000);
        assert_eq!(total.per(4.0).cents(), 250);
        assert_eq!(total.per(0.0), Money::zero());
        // tiny but positive quantities still divide
        assert_eq!(Money::from_cents(1).per(1e-12).cents(), 1_000_000_000_000);
    }

    #[test]
    fn test_checked_arithmetic_stops_at_ceiling() {
        let big = Money::from_cents(MAX_AMOUNT_CENTS);
        assert_eq!(big.checked_add(Money::from_cents(0)), Some(big));
        assert_eq!(big.checked_add(Money::from_cents(1)), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);

        assert_eq!(Money::from_cents(100).checked_times(1e18), None);
        assert_eq!(Money::from_cents(100).checked_times(f64::NAN), None);
        assert_eq!(Money::from_cents(333).checked_times(1.5), Some(Money::from_cents(500)));
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_cents(-10).floor_zero(), Money::zero());
        assert_eq!(Money::from_cents(10).floor_zero().cents(), 10);
    }
}
