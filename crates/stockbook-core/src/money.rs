//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  A ledger that allocates an overpayment across five open sales cannot   │
//! │  afford to lose or invent a fraction of a cent on every split.          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    excess 15000 = 6000 + 5000 + 4000 (credit)   exactly, always         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockbook_core::money::Money;
//! use stockbook_core::quantity::Quantity;
//!
//! let price = Money::from_cents(10_000); // 100.00 per unit
//! let line = price.checked_times(Quantity::from_units(2));
//! assert_eq!(line, Some(Money::from_cents(20_000)));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::quantity::Quantity;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate results (e.g. `tendered - total`) may be
///   negative; persisted obligation amounts never are
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Transparent sqlx encoding**: stored as an INTEGER column
/// - **Operators assume bounded operands**: `+`, `-` and `Sum` are for values
///   already validated against [`MAX_MONEY`](crate::MAX_MONEY); anything fed
///   by unbounded input goes through the `checked_*` methods
///
/// ## Where Money Flows
/// ```text
/// SaleLine.unit_price × quantity ──► Sale.total ──┬─► amount_paid
///                                                 ├─► balance
///                                                 └─► excess ──► Allocator
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use stockbook_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero (`max(0, self)`).
    #[inline]
    pub fn non_negative(self) -> Money {
        Ord::max(self, Money::zero())
    }

    /// Adds two amounts, `None` on `i64` overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Subtracts `other`, `None` on `i64` overflow.
    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts, `None` as soon as the running total overflows.
    pub fn checked_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Multiplies a per-unit price by a (possibly fractional) quantity.
    ///
    /// ## Rounding
    /// Quantities are held in thousandths of a unit, so the exact product is
    /// `cents × milli / 1000`. The result is rounded half away from zero:
    /// `(cents × milli ± 500) / 1000`, computed in i128. `None` when the
    /// rounded result does not fit in `i64`.
    ///
    /// ## Example
    /// ```rust
    /// use stockbook_core::money::Money;
    /// use stockbook_core::quantity::Quantity;
    ///
    /// let per_kg = Money::from_cents(399);
    /// let line = per_kg.checked_times(Quantity::from_milli(2_500)); // 2.5 kg
    /// assert_eq!(line, Some(Money::from_cents(998))); // 997.5 rounds up
    ///
    /// let huge = Money::from_cents(i64::MAX / 2);
    /// assert_eq!(huge.checked_times(Quantity::from_units(3)), None);
    /// ```
    pub fn checked_times(&self, quantity: Quantity) -> Option<Money> {
        let product = self.0 as i128 * quantity.milli() as i128;
        let rounded = if product >= 0 {
            (product + 500) / 1000
        } else {
            (product - 500) / 1000
        };
        i64::try_from(rounded).ok().map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented rendering; locale-aware display belongs to the caller.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
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
    fn mul(self, factor: i64) -> Self {
        Money(self.0 * factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
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
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!(a.min(b), b);
        assert_eq!(a.max(b), a);
        assert_eq!((b - a).non_negative(), Money::zero());
    }

    #[test]
    fn test_times_whole_units() {
        let price = Money::from_cents(10_000);
        assert_eq!(price.checked_times(Quantity::from_units(2)), Some(Money::from_cents(20_000)));
    }

    #[test]
    fn test_times_fractional_rounds_half_away_from_zero() {
        let price = Money::from_cents(1);
        assert_eq!(price.checked_times(Quantity::from_milli(500)), Some(Money::from_cents(1)));
        assert_eq!(price.checked_times(Quantity::from_milli(499)), Some(Money::zero()));
        assert_eq!(
            Money::from_cents(-1).checked_times(Quantity::from_milli(500)),
            Some(Money::from_cents(-1))
        );
    }

    #[test]
    fn test_times_overflow_is_none() {
        // 6_148_914_691_236_517_206 × 3 wraps to 2 in plain i64 arithmetic
        let price = Money::from_cents(6_148_914_691_236_517_206);
        assert_eq!(price.checked_times(Quantity::from_units(3)), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_times(Quantity::from_units(2)), None);
    }

    #[test]
    fn test_checked_add_and_sum() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max.checked_add(Money::from_cents(100)), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(100).checked_add(Money::from_cents(50)),
            Some(Money::from_cents(150))
        );

        assert_eq!(
            Money::checked_sum([Money::from_cents(6000), Money::from_cents(5000)]),
            Some(Money::from_cents(11_000))
        );
        assert_eq!(Money::checked_sum([max, Money::from_cents(1)]), None);
        assert_eq!(Money::checked_sum(Vec::new()), Some(Money::zero()));
    }

    #[test]
    fn test_sum() {
        let amounts = [Money::from_cents(6000), Money::from_cents(5000)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.cents(), 11_000);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(-100).is_negative());
    }
}
