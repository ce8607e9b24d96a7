//! # Validation Module
//!
//! Input validation for request structs, run before a unit of work begins.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request handler                                              │
//! │  └── Deserialization into typed command structs                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Command::validate() (engine)                                 │
//! │  └── THIS MODULE: shape and range checks, no I/O                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Transaction Engine                                           │
//! │  ├── Reference checks (customer, product, batch exist)                 │
//! │  └── Business rules (stock, return bounds, OTP)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── CHECK (current_stock >= 0), FOREIGN KEY, UNIQUE                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use medledger_core::validation::{validate_batch_number, validate_quantity};
//!
//! validate_batch_number("PCM-2411").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_DOCUMENT_LINES, MAX_LINE_QUANTITY, OTP_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a printed batch (lot) number.
///
/// ## Rules
/// - Must not be empty
/// - At most 40 characters
/// - Letters, digits, `-`, `/` and `.` only
///
/// ## Example
/// ```rust
/// use medledger_core::validation::validate_batch_number;
///
/// assert!(validate_batch_number("AMX/24/07").is_ok());
/// assert!(validate_batch_number("").is_err());
/// assert!(validate_batch_number("has space").is_err());
/// ```
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    let batch_number = batch_number.trim();

    if batch_number.is_empty() {
        return Err(ValidationError::Required {
            field: "batch_number".to_string(),
        });
    }

    if batch_number.len() > 40 {
        return Err(ValidationError::TooLong {
            field: "batch_number".to_string(),
            max: 40,
        });
    }

    if !batch_number
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "batch_number".to_string(),
            reason: "must contain only letters, digits, '-', '/' and '.'".to_string(),
        });
    }

    Ok(())
}

/// Validates an HSN code: 4 to 8 digits.
pub fn validate_hsn_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "hsn_code".to_string(),
        });
    }

    if !(4..=8).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "hsn_code".to_string(),
            reason: "must be 4 to 8 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a return reason.
///
/// ## Rules
/// - Must not be empty
/// - At most 500 characters
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 500,
        });
    }

    Ok(())
}

/// Validates the shape of a delivery OTP: exactly six ASCII digits.
///
/// A well-formed but wrong OTP is a business error, not a validation error;
/// that comparison happens against the stored value.
pub fn validate_otp_format(otp: &str) -> ValidationResult<()> {
    if otp.len() != OTP_LENGTH || !otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "otp".to_string(),
            reason: format!("must be exactly {} digits", OTP_LENGTH),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in paise.
///
/// Zero is allowed (free samples); negatives are not.
///
/// ## Example
/// ```rust
/// use medledger_core::validation::validate_price_paise;
///
/// assert!(validate_price_paise("sale_price", 1099).is_ok());
/// assert!(validate_price_paise("sale_price", 0).is_ok());
/// assert!(validate_price_paise("sale_price", -100).is_err());
/// ```
pub fn validate_price_paise(field: &str, paise: i64) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a discount in paise (non-negative).
///
/// The upper bound depends on the computed document total and is checked
/// by [`crate::pricing::DocumentTotals::from_lines`].
pub fn validate_discount_paise(paise: i64) -> ValidationResult<()> {
    validate_price_paise("discount", paise)
}

/// Validates a GST rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_gst_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "gst_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates the expiry of stock being received on `as_of`.
///
/// Receiving already-expired stock is rejected; it could never be sold.
pub fn validate_expiry_date(expiry: NaiveDate, as_of: NaiveDate) -> ValidationResult<()> {
    if expiry <= as_of {
        return Err(ValidationError::InvalidFormat {
            field: "expiry_date".to_string(),
            reason: format!("{} is not after {}", expiry, as_of),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on a document.
///
/// ## Rules
/// - At least one line
/// - At most `max_lines` (capped by MAX_DOCUMENT_LINES)
pub fn validate_line_count(count: usize, max_lines: usize) -> ValidationResult<()> {
    let max = max_lines.min(MAX_DOCUMENT_LINES);

    if count == 0 {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if count > max {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: max as i64,
        });
    }

    Ok(())
}

/// Rejects a list of ids that contains the same id twice.
pub fn validate_unique_ids<'a, I>(field: &str, ids: I) -> ValidationResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::Duplicate {
                field: field.to_string(),
                value: id.to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use medledger_core::validation::validate_uuid;
///
/// assert!(validate_uuid("customer_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("customer_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates a non-empty identifier that is not necessarily a UUID
/// (user ids come from the auth service in its own format).
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_batch_number() {
        assert!(validate_batch_number("PCM-2411").is_ok());
        assert!(validate_batch_number("AMX/24/07").is_ok());
        assert!(validate_batch_number("B.12").is_ok());

        assert!(validate_batch_number("").is_err());
        assert!(validate_batch_number("   ").is_err());
        assert!(validate_batch_number("has space").is_err());
        assert!(validate_batch_number(&"A".repeat(41)).is_err());
    }

    #[test]
    fn test_validate_hsn_code() {
        assert!(validate_hsn_code("3004").is_ok());
        assert!(validate_hsn_code("30049099").is_ok());
        assert!(validate_hsn_code("300").is_err());
        assert!(validate_hsn_code("30A4").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_otp_format() {
        assert!(validate_otp_format("004211").is_ok());
        assert!(validate_otp_format("12345").is_err());
        assert!(validate_otp_format("1234567").is_err());
        assert!(validate_otp_format("12a456").is_err());
    }

    #[test]
    fn test_validate_gst_rate_bps() {
        assert!(validate_gst_rate_bps(0).is_ok());
        assert!(validate_gst_rate_bps(1200).is_ok());
        assert!(validate_gst_rate_bps(10_000).is_ok());
        assert!(validate_gst_rate_bps(10_001).is_err());
    }

    #[test]
    fn test_validate_expiry_date() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert!(validate_expiry_date(today.succ_opt().unwrap(), today).is_ok());
        assert!(validate_expiry_date(today, today).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(1, 200).is_ok());
        assert!(validate_line_count(0, 200).is_err());
        assert!(validate_line_count(11, 10).is_err());
        // configured maximum cannot raise the hard cap
        assert!(validate_line_count(MAX_DOCUMENT_LINES + 1, 10_000).is_err());
    }

    #[test]
    fn test_validate_unique_ids() {
        assert!(validate_unique_ids("item_id", ["a", "b"]).is_ok());
        let err = validate_unique_ids("item_id", ["a", "b", "a"]).unwrap_err();
        assert!(matches!(err, ValidationError::Duplicate { .. }));
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }

    #[test]
    fn test_validate_required() {
        assert!(validate_required("user_id", "usr_42").is_ok());
        assert!(validate_required("user_id", "  ").is_err());
    }
}
