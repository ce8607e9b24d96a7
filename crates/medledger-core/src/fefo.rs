//! # FEFO Batch Selector
//!
//! First-Expiry-First-Out selection of the batch that fulfils a sale line.
//!
//! ## Selection Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  candidates = batches where expiry_date > as_of                         │
//! │                         and current_stock >= quantity                   │
//! │                                                                         │
//! │  pick min by (expiry_date, receipt_seq)                                 │
//! │                                                                         │
//! │  Example, as_of = 2025-01-15, quantity = 10:                            │
//! │    B1  exp 2024-12-31  stock 50   ✗ expired                             │
//! │    B2  exp 2025-06-30  stock 40   ✓                                     │
//! │    B3  exp 2025-01-31  stock  8   ✗ too little                          │
//! │    B4  exp 2025-01-31  stock 20   ✓ ◄── selected                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A line is never split across batches. If no single batch can cover the
//! whole quantity the line fails with `InsufficientStock`, reporting the
//! largest quantity any one sellable batch could have supplied.
//!
//! The caller passes `as_of` explicitly; nothing here reads a clock.

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::types::{Batch, Product};

/// Picks the batch to fulfil `quantity` of `product`.
///
/// `batches` may contain any batches of the product in any order; expired
/// and short batches are skipped.
///
/// ## Example
/// ```rust
/// use chrono::{NaiveDate, Utc};
/// use medledger_core::fefo::select_batch;
/// use medledger_core::types::{Batch, Product};
///
/// # let now = Utc::now();
/// # let product = Product { id: "p1".into(), name: "Cetirizine 10mg".into(), manufacturer: None,
/// #     hsn_code: "3004".into(), default_gst_rate_bps: 1200, created_at: now, updated_at: now };
/// # let batch = |id: &str, y, m, stock, seq| Batch { id: id.into(), product_id: "p1".into(),
/// #     batch_number: id.into(), expiry_date: NaiveDate::from_ymd_opt(y, m, 28).unwrap(),
/// #     purchase_price_paise: 100, sale_price_paise: 150, gst_rate_bps: 1200,
/// #     current_stock: stock, receipt_seq: seq, created_at: now };
/// let batches = vec![batch("late", 2026, 6, 10, 1), batch("early", 2026, 1, 10, 2)];
/// let as_of = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
///
/// let chosen = select_batch(&product, &batches, 5, as_of).unwrap();
/// assert_eq!(chosen.id, "early");
/// ```
pub fn select_batch<'a>(
    product: &Product,
    batches: &'a [Batch],
    quantity: i64,
    as_of: NaiveDate,
) -> CoreResult<&'a Batch> {
    batches
        .iter()
        .filter(|b| b.product_id == product.id && b.can_fulfil(quantity, as_of))
        .min_by_key(|b| (b.expiry_date, b.receipt_seq))
        .ok_or_else(|| CoreError::InsufficientStock {
            product: product.name.clone(),
            requested: quantity,
            available: best_single_batch_stock(product, batches, as_of),
        })
}

/// Validates a batch the caller chose explicitly (manual override).
///
/// ## Errors
/// - `BatchProductMismatch` if the batch belongs to another product
/// - `BatchExpired` if `expiry_date <= as_of`
/// - `InsufficientStock` if the batch holds less than `quantity`
pub fn validate_batch(
    product: &Product,
    batch: &Batch,
    quantity: i64,
    as_of: NaiveDate,
) -> CoreResult<()> {
    if batch.product_id != product.id {
        return Err(CoreError::BatchProductMismatch {
            product: product.name.clone(),
            batch_id: batch.id.clone(),
        });
    }

    if batch.is_expired(as_of) {
        return Err(CoreError::BatchExpired {
            product: product.name.clone(),
            batch_number: batch.batch_number.clone(),
            expiry_date: batch.expiry_date,
        });
    }

    if batch.current_stock < quantity {
        return Err(CoreError::InsufficientStock {
            product: product.name.clone(),
            requested: quantity,
            available: batch.current_stock,
        });
    }

    Ok(())
}

/// Largest stock held by any one sellable batch of the product.
fn best_single_batch_stock(product: &Product, batches: &[Batch], as_of: NaiveDate) -> i64 {
    batches
        .iter()
        .filter(|b| b.product_id == product.id && !b.is_expired(as_of))
        .map(|b| b.current_stock)
        .max()
        .unwrap_or(0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn product() -> Product {
        let now = Utc::now();
        Product {
            id: "p1".to_string(),
            name: "Paracetamol 500mg".to_string(),
            manufacturer: Some("Acme Pharma".to_string()),
            hsn_code: "3004".to_string(),
            default_gst_rate_bps: 1200,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(id: &str, expiry: NaiveDate, stock: i64, seq: i64) -> Batch {
        Batch {
            id: id.to_string(),
            product_id: "p1".to_string(),
            batch_number: id.to_uppercase(),
            expiry_date: expiry,
            purchase_price_paise: 800,
            sale_price_paise: 1_000,
            gst_rate_bps: 1200,
            current_stock: stock,
            receipt_seq: seq,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_selects_earliest_non_expired() {
        let batches = vec![
            batch("jun", date(2025, 6, 30), 100, 1),
            batch("dec", date(2024, 12, 31), 100, 2),
            batch("jan", date(2025, 1, 31), 100, 3),
        ];
        let chosen = select_batch(&product(), &batches, 10, date(2025, 1, 1)).unwrap();
        assert_eq!(chosen.id, "jan");
    }

    #[test]
    fn test_never_selects_expired_even_with_stock() {
        let batches = vec![batch("old", date(2024, 12, 31), 1_000, 1)];
        let err = select_batch(&product(), &batches, 1, date(2025, 1, 1)).unwrap_err();
        match err {
            CoreError::InsufficientStock { available, .. } => assert_eq!(available, 0),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_batch_expiring_on_as_of_is_skipped() {
        let batches = vec![
            batch("today", date(2025, 1, 1), 50, 1),
            batch("later", date(2025, 2, 1), 50, 2),
        ];
        let chosen = select_batch(&product(), &batches, 5, date(2025, 1, 1)).unwrap();
        assert_eq!(chosen.id, "later");
    }

    #[test]
    fn test_tie_broken_by_receipt_order() {
        let batches = vec![
            batch("second", date(2025, 3, 31), 10, 7),
            batch("first", date(2025, 3, 31), 10, 3),
        ];
        let chosen = select_batch(&product(), &batches, 10, date(2025, 1, 1)).unwrap();
        assert_eq!(chosen.id, "first");
    }

    #[test]
    fn test_does_not_split_lines() {
        let batches = vec![
            batch("a", date(2025, 3, 31), 6, 1),
            batch("b", date(2025, 4, 30), 6, 2),
        ];
        let err = select_batch(&product(), &batches, 10, date(2025, 1, 1)).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                product,
                requested,
                available,
            } => {
                assert_eq!(product, "Paracetamol 500mg");
                assert_eq!(requested, 10);
                assert_eq!(available, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_skips_short_batch_for_later_one() {
        let batches = vec![
            batch("short", date(2025, 2, 28), 3, 1),
            batch("full", date(2025, 5, 31), 30, 2),
        ];
        let chosen = select_batch(&product(), &batches, 10, date(2025, 1, 1)).unwrap();
        assert_eq!(chosen.id, "full");
    }

    #[test]
    fn test_validate_batch_override() {
        let p = product();
        let as_of = date(2025, 1, 1);

        assert!(validate_batch(&p, &batch("ok", date(2025, 6, 30), 10, 1), 10, as_of).is_ok());

        let err = validate_batch(&p, &batch("old", date(2024, 6, 30), 10, 1), 1, as_of).unwrap_err();
        assert!(matches!(err, CoreError::BatchExpired { .. }));

        let err = validate_batch(&p, &batch("low", date(2025, 6, 30), 2, 1), 5, as_of).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 2, .. }));

        let mut other = batch("other", date(2025, 6, 30), 10, 1);
        other.product_id = "p2".to_string();
        let err = validate_batch(&p, &other, 1, as_of).unwrap_err();
        assert!(matches!(err, CoreError::BatchProductMismatch { .. }));
    }

    proptest! {
        #[test]
        fn prop_selected_batch_is_minimal_and_valid(
            specs in proptest::collection::vec((0i64..400, 0i64..50), 1..12),
            quantity in 1i64..40,
        ) {
            let as_of = date(2025, 6, 1);
            let base = date(2025, 1, 1);
            let batches: Vec<Batch> = specs
                .iter()
                .enumerate()
                .map(|(i, (days, stock))| {
                    batch(&format!("b{i}"), base + chrono::Duration::days(*days), *stock, i as i64)
                })
                .collect();

            match select_batch(&product(), &batches, quantity, as_of) {
                Ok(chosen) => {
                    prop_assert!(chosen.expiry_date > as_of);
                    prop_assert!(chosen.current_stock >= quantity);
                    for b in batches.iter().filter(|b| b.can_fulfil(quantity, as_of)) {
                        prop_assert!((chosen.expiry_date, chosen.receipt_seq) <= (b.expiry_date, b.receipt_seq));
                    }
                }
                Err(_) => {
                    prop_assert!(batches.iter().all(|b| !b.can_fulfil(quantity, as_of)));
                }
            }
        }
    }
}
