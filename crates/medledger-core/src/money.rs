//! # Money Module
//!
//! Provides the `Money` type for handling rupee amounts safely.
//!
//! ## Why Integer Paise?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  GST on an invoice must reconcile to the paisa with the bill the        │
//! │  customer holds and the return filed with the tax authority.            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise (1 rupee = 100 paise)                      │
//! │    Every amount is an i64; rounding happens in exactly one place        │
//! │    (`calculate_gst`) with a documented rule.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use medledger_core::money::Money;
//!
//! let price = Money::from_paise(10_050); // ₹100.50
//! let doubled = price * 2;               // ₹201.00
//! assert_eq!(doubled.paise(), 20_100);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::types::GstRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in paise (the smallest rupee unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: balances go negative when a credit note exceeds dues
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serializes as a bare integer**: `{"net_amount": 118000}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise.
    ///
    /// ## Example
    /// ```rust
    /// use medledger_core::money::Money;
    ///
    /// let price = Money::from_paise(1099); // ₹10.99
    /// assert_eq!(price.paise(), 1099);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
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

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates GST on this amount, rounded half-up to the paisa.
    ///
    /// ## Rounding Rule
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  ROUND HALF UP (away from zero)                                     │
    /// │                                                                     │
    /// │   ₹10.05 × 5%  = 50.25 paise  → 50 paise                           │
    /// │   ₹10.10 × 5%  = 50.50 paise  → 51 paise                           │
    /// │  -₹10.10 × 5%  = -50.50 paise → -51 paise                          │
    /// │                                                                     │
    /// │  Matches how amounts are printed on the bill, so the sum of the    │
    /// │  printed GST column equals the stored document GST.                 │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Returns
    /// `None` when the result does not fit in an i64.
    ///
    /// ## Example
    /// ```rust
    /// use medledger_core::money::Money;
    /// use medledger_core::types::GstRate;
    ///
    /// let taxable = Money::from_paise(30_000); // ₹300.00
    /// let gst = taxable.calculate_gst(GstRate::from_percent(12)).unwrap();
    /// assert_eq!(gst.paise(), 3_600);          // ₹36.00
    /// ```
    pub fn calculate_gst(&self, rate: GstRate) -> Option<Money> {
        // i128 so that paise × bps cannot overflow before the division
        let numerator = self.0 as i128 * rate.bps() as i128;
        let magnitude = (numerator.abs() + 5_000) / 10_000;
        let signed = if numerator < 0 { -magnitude } else { magnitude };
        i64::try_from(signed).ok().map(Money)
    }

    /// Multiplies money by a quantity, returning `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use medledger_core::money::Money;
    ///
    /// let unit_price = Money::from_paise(299);
    /// assert_eq!(unit_price.checked_mul_quantity(3).unwrap().paise(), 897);
    /// ```
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Displays as `₹1234.50`; for logs and error messages.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
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
    fn test_from_paise() {
        let money = Money::from_paise(1099);
        assert_eq!(money.paise(), 1099);
        assert_eq!(money.rupees(), 10);
        assert_eq!(money.paise_part(), 99);
        assert_eq!(Money::from_rupees(1180).paise(), 118_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_paise(1099)), "₹10.99");
        assert_eq!(format!("{}", Money::from_paise(500)), "₹5.00");
        assert_eq!(format!("{}", Money::from_paise(-550)), "-₹5.50");
        assert_eq!(format!("{}", Money::zero()), "₹0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_paise(1000);
        let b = Money::from_paise(500);

        assert_eq!((a + b).paise(), 1500);
        assert_eq!((a - b).paise(), 500);
        assert_eq!((a * 3).paise(), 3000);
        assert_eq!((-a).paise(), -1000);
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>().paise(), 2000);
    }

    #[test]
    fn test_gst_exact() {
        let gst = Money::from_paise(30_000)
            .calculate_gst(GstRate::from_percent(12))
            .unwrap();
        assert_eq!(gst.paise(), 3_600);
    }

    #[test]
    fn test_gst_rounds_half_up() {
        // 1010 paise × 5% = 50.5 paise → 51
        let gst = Money::from_paise(1010)
            .calculate_gst(GstRate::from_percent(5))
            .unwrap();
        assert_eq!(gst.paise(), 51);

        // 1005 paise × 5% = 50.25 paise → 50
        let gst = Money::from_paise(1005)
            .calculate_gst(GstRate::from_percent(5))
            .unwrap();
        assert_eq!(gst.paise(), 50);
    }

    #[test]
    fn test_gst_negative_rounds_away_from_zero() {
        let gst = Money::from_paise(-1010)
            .calculate_gst(GstRate::from_percent(5))
            .unwrap();
        assert_eq!(gst.paise(), -51);
    }

    #[test]
    fn test_gst_zero_rate() {
        let gst = Money::from_paise(99_999).calculate_gst(GstRate::zero()).unwrap();
        assert!(gst.is_zero());
    }

    #[test]
    fn test_checked_mul_overflow() {
        assert!(Money::from_paise(i64::MAX).checked_mul_quantity(2).is_none());
        assert_eq!(
            Money::from_paise(299).checked_mul_quantity(3),
            Some(Money::from_paise(897))
        );
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(Money::from_paise(-100).is_negative());
        assert_eq!(Money::from_paise(-100).abs().paise(), 100);
    }
}
