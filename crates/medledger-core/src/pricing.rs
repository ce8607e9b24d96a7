//! # Pricing & Tax Calculator
//!
//! Computes line and document amounts with GST.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  per line:                                                              │
//! │    line_subtotal = quantity × unit_price          (exact, no rounding)  │
//! │    gst_amount    = round_half_up(line_subtotal × bps / 10000)           │
//! │    line_total    = line_subtotal + gst_amount                           │
//! │                                                                         │
//! │  per document:                                                          │
//! │    subtotal   = Σ line_subtotal                                         │
//! │    total_gst  = Σ gst_amount      (sum of rounded, never re-rounded)    │
//! │    net_amount = subtotal + total_gst − discount                         │
//! │                                                                         │
//! │  Discount is applied after tax at document level.                       │
//! │                                                                         │
//! │  credit note for returned goods:                                        │
//! │    share = round_half_up(discount × returned_gross / invoice_gross)     │
//! │    total = returned_gross − share                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Summing already-rounded line GST keeps the document total equal to the
//! column printed on the bill. It can differ by a paisa from GST computed on
//! the aggregate subtotal.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::GstRate;

// =============================================================================
// Line Amounts
// =============================================================================

/// Computed amounts for one document line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    pub line_subtotal: Money,
    pub gst_amount: Money,
    pub line_total: Money,
}

/// Computes subtotal, GST and total for a line.
///
/// ## Example
/// ```rust
/// use medledger_core::money::Money;
/// use medledger_core::pricing::compute_line;
/// use medledger_core::types::GstRate;
///
/// let line = compute_line(3, Money::from_rupees(100), GstRate::from_percent(12)).unwrap();
/// assert_eq!(line.line_subtotal, Money::from_rupees(300));
/// assert_eq!(line.gst_amount, Money::from_rupees(36));
/// assert_eq!(line.line_total, Money::from_rupees(336));
/// ```
pub fn compute_line(quantity: i64, unit_price: Money, rate: GstRate) -> CoreResult<LineAmounts> {
    let line_subtotal = unit_price
        .checked_mul_quantity(quantity)
        .ok_or_else(|| CoreError::overflow("line subtotal"))?;
    let gst_amount = line_subtotal
        .calculate_gst(rate)
        .ok_or_else(|| CoreError::overflow("line GST"))?;
    let line_total = line_subtotal
        .checked_add(gst_amount)
        .ok_or_else(|| CoreError::overflow("line total"))?;

    Ok(LineAmounts {
        line_subtotal,
        gst_amount,
        line_total,
    })
}

// =============================================================================
// Document Totals
// =============================================================================

/// Document-level totals built from line amounts.
///
/// ## Invariant
/// `net_amount == subtotal + total_gst - discount`, always recomputed from
/// lines and never taken from client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub total_gst: Money,
    pub discount: Money,
    pub net_amount: Money,
}

impl DocumentTotals {
    /// Sums lines and applies a post-tax discount.
    ///
    /// ## Errors
    /// - `Validation` if the discount is negative
    /// - `DiscountExceedsTotal` if the discount is larger than subtotal + GST
    /// - `AmountOverflow` if any sum leaves the i64 range
    pub fn from_lines(lines: &[LineAmounts], discount: Money) -> CoreResult<Self> {
        if discount.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "discount".to_string(),
            }
            .into());
        }

        let mut subtotal = Money::zero();
        let mut total_gst = Money::zero();
        for line in lines {
            subtotal = subtotal
                .checked_add(line.line_subtotal)
                .ok_or_else(|| CoreError::overflow("document subtotal"))?;
            total_gst = total_gst
                .checked_add(line.gst_amount)
                .ok_or_else(|| CoreError::overflow("document GST"))?;
        }

        let gross = subtotal
            .checked_add(total_gst)
            .ok_or_else(|| CoreError::overflow("document total"))?;

        if discount > gross {
            return Err(CoreError::DiscountExceedsTotal {
                discount_paise: discount.paise(),
                total_paise: gross.paise(),
            });
        }

        Ok(DocumentTotals {
            subtotal,
            total_gst,
            discount,
            net_amount: gross - discount,
        })
    }

    /// Totals for documents that carry no discount (bills, returns).
    pub fn undiscounted(lines: &[LineAmounts]) -> CoreResult<Self> {
        Self::from_lines(lines, Money::zero())
    }

    /// subtotal + GST, before discount.
    #[inline]
    pub fn gross(&self) -> Money {
        self.subtotal + self.total_gst
    }
}

// =============================================================================
// Discount Proration
// =============================================================================

/// Share of a document `discount` carried by `part` of its `gross`,
/// rounded half up and never more than the discount itself.
///
/// ## Example
/// ```rust
/// use medledger_core::money::Money;
/// use medledger_core::pricing::prorate_discount;
///
/// // ₹180 off a ₹1,180 invoice; a third of the goods come back
/// let share = prorate_discount(
///     Money::from_paise(18_000),
///     Money::from_paise(39_333),
///     Money::from_paise(118_000),
/// );
/// assert_eq!(share.paise(), 6_000);
/// ```
pub fn prorate_discount(discount: Money, part: Money, gross: Money) -> Money {
    if !discount.is_positive() || !part.is_positive() || !gross.is_positive() {
        return Money::zero();
    }
    if part >= gross {
        return discount;
    }

    let numerator = discount.paise() as i128 * part.paise() as i128;
    let denominator = gross.paise() as i128;
    let share = (2 * numerator + denominator) / (2 * denominator);
    // part < gross, so share ≤ discount and fits in i64
    Money::from_paise(share as i64)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn twelve() -> GstRate {
        GstRate::from_percent(12)
    }

    #[test]
    fn test_compute_line_reference_values() {
        let line = compute_line(3, Money::from_paise(10_000), twelve()).unwrap();
        assert_eq!(line.line_subtotal.paise(), 30_000);
        assert_eq!(line.gst_amount.paise(), 3_600);
        assert_eq!(line.line_total.paise(), 33_600);
    }

    #[test]
    fn test_document_from_two_lines() {
        let line = compute_line(3, Money::from_paise(10_000), twelve()).unwrap();
        let totals = DocumentTotals::from_lines(&[line, line], Money::from_paise(2_000)).unwrap();

        assert_eq!(totals.subtotal.paise(), 60_000);
        assert_eq!(totals.total_gst.paise(), 7_200);
        assert_eq!(totals.net_amount.paise(), 60_000 + 7_200 - 2_000);
    }

    #[test]
    fn test_document_gst_is_sum_of_rounded_lines() {
        // 1010 × 5% = 50.5 → 51 per line; on the aggregate 2020 × 5% = 101
        let line = compute_line(1, Money::from_paise(1_010), GstRate::from_percent(5)).unwrap();
        let totals = DocumentTotals::undiscounted(&[line, line]).unwrap();
        assert_eq!(totals.total_gst.paise(), 102);
    }

    #[test]
    fn test_discount_bounds() {
        let line = compute_line(1, Money::from_paise(1_000), twelve()).unwrap();

        let full = DocumentTotals::from_lines(&[line], Money::from_paise(1_120)).unwrap();
        assert!(full.net_amount.is_zero());

        let err = DocumentTotals::from_lines(&[line], Money::from_paise(1_121)).unwrap_err();
        assert!(matches!(err, CoreError::DiscountExceedsTotal { .. }));

        let err = DocumentTotals::from_lines(&[line], Money::from_paise(-1)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_prorated_discount_shares() {
        let discount = Money::from_paise(18_000);
        let gross = Money::from_paise(118_000);

        assert_eq!(prorate_discount(discount, gross, gross), discount);
        assert_eq!(prorate_discount(discount, Money::from_paise(59_000), gross).paise(), 9_000);
        // 18000 × 1 / 118000 = 0.15 → 0
        assert!(prorate_discount(discount, Money::from_paise(1), gross).is_zero());
        assert!(prorate_discount(Money::zero(), gross, gross).is_zero());
        assert!(prorate_discount(discount, Money::zero(), gross).is_zero());
    }

    #[test]
    fn test_line_overflow_is_an_error() {
        let err = compute_line(2, Money::from_paise(i64::MAX), twelve()).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));
    }

    proptest! {
        #[test]
        fn prop_line_total_is_subtotal_plus_gst(
            qty in 1i64..=100_000,
            price in 0i64..=10_000_000,
            bps in 0u32..=10_000,
        ) {
            let line = compute_line(qty, Money::from_paise(price), GstRate::from_bps(bps)).unwrap();
            prop_assert_eq!(line.line_subtotal.paise(), qty * price);
            prop_assert_eq!(line.line_total, line.line_subtotal + line.gst_amount);
        }

        #[test]
        fn prop_gst_within_half_paisa_of_exact(
            qty in 1i64..=1_000,
            price in 0i64..=1_000_000,
            bps in 0u32..=10_000,
        ) {
            let line = compute_line(qty, Money::from_paise(price), GstRate::from_bps(bps)).unwrap();
            // |gst × 10000 − subtotal × bps| ≤ 5000 (half a paisa, scaled)
            let exact = line.line_subtotal.paise() as i128 * bps as i128;
            let scaled = line.gst_amount.paise() as i128 * 10_000;
            prop_assert!((scaled - exact).abs() <= 5_000);
        }

        #[test]
        fn prop_net_amount_identity(
            prices in proptest::collection::vec(0i64..=1_000_000, 1..20),
            discount_pct in 0i64..=100,
        ) {
            let lines: Vec<_> = prices
                .iter()
                .map(|p| compute_line(2, Money::from_paise(*p), GstRate::from_percent(12)).unwrap())
                .collect();
            let gross = DocumentTotals::undiscounted(&lines).unwrap().gross();
            let discount = Money::from_paise(gross.paise() * discount_pct / 100);
            let totals = DocumentTotals::from_lines(&lines, discount).unwrap();

            prop_assert_eq!(totals.net_amount, totals.subtotal + totals.total_gst - totals.discount);
            prop_assert!(!totals.net_amount.is_negative());
        }
    }
}
