//! # Error Types
//!
//! Domain-specific error types for medledger-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  medledger-core errors (this file)                                     │
//! │  ├── CoreError        - Business rules and missing references          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  medledger-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  medledger-engine errors                                               │
//! │  └── LedgerError      - What request handlers see                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → LedgerError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Every line-level error names the product, so the caller can point at
//!    the offending row
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant aborts the enclosing unit of work. None of them is retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Supplier not found: {0}")]
    SupplierNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Purchase not found: {0}")]
    PurchaseNotFound(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// A return line references an item that is not on the given invoice.
    #[error("Item {item_id} is not part of sale {sale_id}")]
    ItemNotInSale { sale_id: String, item_id: String },

    #[error("Item {item_id} is not part of purchase {purchase_id}")]
    ItemNotInPurchase { purchase_id: String, item_id: String },

    /// Not enough sellable stock to fulfil a line from a single batch.
    ///
    /// ## User Workflow
    /// ```text
    /// Invoice line: Paracetamol 500mg × 50
    ///      │
    ///      ▼
    /// FEFO: best non-expired batch has 30
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Paracetamol 500mg", requested: 50, available: 30 }
    ///      │
    ///      ▼
    /// Whole invoice rolls back
    /// ```
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    /// A purchase return asks for more than the batch still holds.
    #[error(
        "Insufficient stock to return {product} (batch {batch_number}): requested {requested}, available {available}"
    )]
    InsufficientStockForReturn {
        product: String,
        batch_number: String,
        requested: i64,
        available: i64,
    },

    /// Cumulative returns would exceed what was sold or bought on the line.
    #[error(
        "Return quantity for {product} (item {item_id}) exceeds original: requested {requested}, returnable {returnable}"
    )]
    ReturnQuantityExceedsOriginal {
        product: String,
        item_id: String,
        requested: i64,
        returnable: i64,
    },

    /// An explicitly chosen batch is past its expiry.
    #[error("Batch {batch_number} of {product} expired on {expiry_date}")]
    BatchExpired {
        product: String,
        batch_number: String,
        expiry_date: chrono::NaiveDate,
    },

    /// An explicitly chosen batch belongs to another product.
    #[error("Batch {batch_id} does not belong to product {product}")]
    BatchProductMismatch { product: String, batch_id: String },

    #[error("User {user_id} is not allowed to generate invoices")]
    UnauthorizedInvoiceGeneration { user_id: String },

    #[error("Invoice {invoice_number} is already {status}")]
    AlreadyDelivered {
        invoice_number: String,
        status: String,
    },

    #[error("Invalid delivery OTP for invoice {invoice_number}")]
    InvalidOtp { invoice_number: String },

    #[error("Discount {discount_paise} exceeds document total {total_paise}")]
    DiscountExceedsTotal {
        discount_paise: i64,
        total_paise: i64,
    },

    /// Amount arithmetic left the i64 range.
    #[error("Amount overflow while computing {context}")]
    AmountOverflow { context: String },

    /// Tax classification of a product is frozen once a batch references it.
    #[error("Product {product_id} is referenced by batches; only descriptive fields can change")]
    ProductInUse { product_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::AmountOverflow`].
    pub fn overflow(context: impl Into<String>) -> Self {
        CoreError::AmountOverflow {
            context: context.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the request boundary before any mutation begins.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, non-numeric OTP).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Same value listed twice where it must be unique (e.g., return lines).
    #[error("{field} '{value}' is listed more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_names_product() {
        let err = CoreError::InsufficientStock {
            product: "Paracetamol 500mg".to_string(),
            requested: 50,
            available: 30,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Paracetamol 500mg: requested 50, available 30"
        );
    }

    #[test]
    fn test_return_errors_carry_context() {
        let err = CoreError::InsufficientStockForReturn {
            product: "Amoxicillin 250mg".to_string(),
            batch_number: "AMX-0425".to_string(),
            requested: 12,
            available: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("Amoxicillin 250mg"));
        assert!(msg.contains("AMX-0425"));
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "user_id".to_string(),
        };
        assert_eq!(err.to_string(), "user_id is required");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 100_000,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 100000");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "customer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
