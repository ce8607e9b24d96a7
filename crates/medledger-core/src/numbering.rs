//! # Document Numbering
//!
//! Human-facing document numbers: `PREFIX-YYYYMM-NNNNNN`.
//!
//! ```text
//!   INV-202610-000042
//!   ─┬─ ──┬─── ──┬───
//!    │    │      └── per-(kind, period) counter, zero-padded to 6
//!    │    └───────── business month of the document
//!    └────────────── document kind
//! ```
//!
//! The counter itself is persisted by medledger-db and incremented inside
//! the same transaction as the document; this module only formats.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of numbered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Sale invoice.
    Invoice,
    /// Purchase bill.
    PurchaseBill,
    /// Sales order (numbered for callers outside the engine).
    Order,
    /// Sales return.
    CreditNote,
    /// Purchase return.
    DebitNote,
}

impl DocumentKind {
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::PurchaseBill => "BILL",
            DocumentKind::Order => "ORD",
            DocumentKind::CreditNote => "CN",
            DocumentKind::DebitNote => "DN",
        }
    }

    /// Key stored in the `document_sequences.kind` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::PurchaseBill => "purchase_bill",
            DocumentKind::Order => "order",
            DocumentKind::CreditNote => "credit_note",
            DocumentKind::DebitNote => "debit_note",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numbering period for a business date (`YYYYMM`).
pub fn period_key(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

/// Formats a document number.
///
/// Sequences past 999 999 widen rather than wrap.
///
/// ## Example
/// ```rust
/// use medledger_core::numbering::{format_document_number, DocumentKind};
///
/// assert_eq!(format_document_number(DocumentKind::Invoice, "202610", 42), "INV-202610-000042");
/// ```
pub fn format_document_number(kind: DocumentKind, period: &str, seq: i64) -> String {
    format!("{}-{}-{:06}", kind.prefix(), period, seq)
}
