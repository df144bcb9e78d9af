//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer amounts in the smallest currency unit            │
//! │    Two seats at 100_000 + two drinks at 50_000 = exactly 300_000        │
//! │    Loyalty discount of 10 points × 1_000 = exactly 10_000               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use marquee_core::money::Money;
//!
//! let seat = Money::new(100_000);
//! let pair = seat * 2;                       // 200_000
//! let total = pair + Money::new(100_000);    // 300_000
//!
//! // Discounts can never push a total below zero:
//! let clamped = Money::new(5_000).saturating_sub(Money::new(9_000));
//! assert!(clamped.is_zero());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate arithmetic may dip negative; public
///   totals are clamped by the pricing layer
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for payload serialization
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from an amount in the smallest currency unit.
    #[inline]
    pub const fn new(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the raw amount in the smallest currency unit.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Zero money value.
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

    /// Subtracts, clamping the result at zero.
    ///
    /// This is the clamping policy for discounted totals: a loyalty
    /// discount larger than the subtotal produces a zero total, never a
    /// negative one.
    ///
    /// ## Example
    /// ```rust
    /// use marquee_core::money::Money;
    ///
    /// let subtotal = Money::new(5_000);
    /// let discount = Money::new(9_000);
    /// assert_eq!(subtotal.saturating_sub(discount), Money::zero());
    /// ```
    #[inline]
    pub const fn saturating_sub(&self, other: Money) -> Money {
        let diff = self.0 - other.0;
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use marquee_core::money::Money;
    ///
    /// let unit_price = Money::new(50_000);
    /// let line_total = unit_price.multiply_quantity(2);
    /// assert_eq!(line_total.amount(), 100_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Converts a settled total into earned loyalty points.
    ///
    /// Integer division floors, which is the documented earn rule:
    /// `earned = total / divisor`, remainder forfeited.
    ///
    /// ## Example
    /// ```rust
    /// use marquee_core::money::Money;
    ///
    /// let total = Money::new(290_000);
    /// assert_eq!(total.earned_points(10_000), 29);
    /// ```
    #[inline]
    pub const fn earned_points(&self, divisor: i64) -> i64 {
        if divisor <= 0 || self.0 <= 0 {
            return 0;
        }
        self.0 / divisor
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation groups digits for readability.
///
/// ## Note
/// This is for logs and debugging. UI display formatting (currency
/// symbol, locale) belongs to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}", sign, grouped)
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values (may go negative; see
/// [`Money::saturating_sub`] for the clamped variant).
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_amount() {
        let money = Money::new(100_000);
        assert_eq!(money.amount(), 100_000);
    }

    #[test]
    fn test_display_grouping() {
        assert_eq!(format!("{}", Money::new(290_000)), "290,000");
        assert_eq!(format!("{}", Money::new(1_000_000)), "1,000,000");
        assert_eq!(format!("{}", Money::new(500)), "500");
        assert_eq!(format!("{}", Money::new(-10_000)), "-10,000");
        assert_eq!(format!("{}", Money::new(0)), "0");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::new(100_000);
        let b = Money::new(50_000);

        assert_eq!((a + b).amount(), 150_000);
        assert_eq!((a - b).amount(), 50_000);
        assert_eq!((a * 3).amount(), 300_000);
    }

    #[test]
    fn test_saturating_sub_clamps_at_zero() {
        let subtotal = Money::new(5_000);
        let discount = Money::new(9_000);
        assert_eq!(subtotal.saturating_sub(discount), Money::zero());

        // Normal case is unaffected
        assert_eq!(
            Money::new(300_000).saturating_sub(Money::new(10_000)).amount(),
            290_000
        );
    }

    #[test]
    fn test_earned_points_floors() {
        assert_eq!(Money::new(290_000).earned_points(10_000), 29);
        assert_eq!(Money::new(299_999).earned_points(10_000), 29);
        assert_eq!(Money::new(9_999).earned_points(10_000), 0);
    }

    #[test]
    fn test_earned_points_degenerate_inputs() {
        assert_eq!(Money::zero().earned_points(10_000), 0);
        assert_eq!(Money::new(-100).earned_points(10_000), 0);
        assert_eq!(Money::new(100).earned_points(0), 0);
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::new(50_000);
        assert_eq!(unit_price.multiply_quantity(2).amount(), 100_000);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::new(100).is_positive());
        assert!(Money::new(-100).is_negative());
    }
}
