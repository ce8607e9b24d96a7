//! # medledger-core: Pure Business Logic for MedLedger
//!
//! Everything that decides *what* a sale, purchase or return does to stock,
//! money and balances lives here as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedLedger Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Request handlers (outside this workspace)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                medledger-engine (Transaction Engine)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ medledger-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  pricing  │  │   fefo    │  │ numbering │  │   │
//! │  │   │  Batch    │  │  GST line │  │  earliest │  │  INV-…    │  │   │
//! │  │   │  Invoice  │  │  totals   │  │  expiry   │  │  BILL-…   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 medledger-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Batch, Invoice, Purchase, returns)
//! - [`money`] - Money in paise with integer arithmetic
//! - [`pricing`] - Line and document totals with GST
//! - [`fefo`] - First-expiry-first-out batch selection
//! - [`numbering`] - Document kinds and number formatting
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use medledger_core::money::Money;
//! use medledger_core::pricing::compute_line;
//! use medledger_core::types::GstRate;
//!
//! let line = compute_line(3, Money::from_paise(10_000), GstRate::from_percent(12)).unwrap();
//! assert_eq!(line.gst_amount.paise(), 3_600);
//! assert_eq!(line.line_total.paise(), 33_600);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod fefo;
pub mod money;
pub mod numbering;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use numbering::DocumentKind;
pub use pricing::{DocumentTotals, LineAmounts};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items on a single invoice, bill or return.
pub const MAX_DOCUMENT_LINES: usize = 200;

/// Maximum quantity on a single line.
///
/// ## Business Reason
/// Catches typing 10000 instead of 100 on a strip count.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Number of digits in a delivery OTP.
pub const OTP_LENGTH: usize = 6;
