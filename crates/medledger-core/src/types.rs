//! # Domain Types
//!
//! Core domain records used throughout MedLedger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │1─*│     Batch       │   │     Party       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  hsn_code       │   │  batch_number   │   │  kind (C/S)     │       │
//! │  │  default GST    │   │  expiry_date    │   │  balance_paise  │       │
//! │  └─────────────────┘   │  current_stock  │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  Invoice ──* InvoiceItem ──► Batch      SalesReturn ──* SalesReturnItem │
//! │  Purchase ─* PurchaseItem ─► Batch      PurchaseReturn ─* …ReturnItem   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Document lines copy product name, batch number, unit price and GST rate at
//! creation time. Later price changes on a batch never alter a posted document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::numbering::DocumentKind;
use crate::pricing::LineAmounts;

// =============================================================================
// GST Rate
// =============================================================================

/// GST rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1200 bps = 12%. Indian GST slabs for medicines
/// are 0, 5, 12 and 18 percent; bps leaves room for cess-style fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GstRate(u32);

impl GstRate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        GstRate(bps)
    }

    /// Creates a rate from a whole percentage (12 → 12%).
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        GstRate(pct * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero rate (exempt goods).
    #[inline]
    pub const fn zero() -> Self {
        GstRate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for GstRate {
    fn default() -> Self {
        GstRate::zero()
    }
}

impl fmt::Display for GstRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalogue.
///
/// Tax classification (`hsn_code`, `default_gst_rate_bps`) is frozen once a
/// batch references the product; name and manufacturer stay editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub manufacturer: Option<String>,
    /// HSN code used on GST returns (e.g., "3004").
    pub hsn_code: String,
    pub default_gst_rate_bps: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the default GST rate.
    #[inline]
    pub fn default_gst_rate(&self) -> GstRate {
        GstRate::from_bps(self.default_gst_rate_bps)
    }
}

// =============================================================================
// Batch
// =============================================================================

/// A tracked lot of a product with its own expiry, pricing and stock count.
///
/// ## Invariant
/// `current_stock >= 0`. Only the batch ledger mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Batch {
    pub id: String,
    pub product_id: String,
    /// Printed lot number; not unique across products.
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub purchase_price_paise: i64,
    pub sale_price_paise: i64,
    /// GST rate for this lot; may differ from the product default.
    pub gst_rate_bps: u32,
    pub current_stock: i64,
    /// Monotonic receipt order, used to break expiry ties.
    pub receipt_seq: i64,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_paise(self.sale_price_paise)
    }

    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_paise(self.purchase_price_paise)
    }

    #[inline]
    pub fn gst_rate(&self) -> GstRate {
        GstRate::from_bps(self.gst_rate_bps)
    }

    /// A batch expiring on `as_of` is already unsellable on that day.
    #[inline]
    pub fn is_expired(&self, as_of: NaiveDate) -> bool {
        self.expiry_date <= as_of
    }

    /// True when the batch alone can fulfil `quantity` on `as_of`.
    #[inline]
    pub fn can_fulfil(&self, quantity: i64, as_of: NaiveDate) -> bool {
        !self.is_expired(as_of) && self.current_stock >= quantity
    }
}

// =============================================================================
// Party
// =============================================================================

/// Whether a party buys from us or sells to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Customer,
    Supplier,
}

/// A customer or supplier with a running balance.
///
/// `balance_paise` is what the customer owes us, or what we owe the
/// supplier. It is never written outside the transaction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Party {
    pub id: String,
    pub kind: PartyKind,
    pub name: String,
    /// GSTIN.
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub balance_paise: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Party {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_paise(self.balance_paise)
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Role of the authenticated user, resolved by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    SalesRep,
    Operator,
    Delivery,
}

/// The authenticated caller of a transaction.
///
/// There is no fallback user: an invoice is always attributed to the actor
/// who created it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    /// Permission flag granted by the auth service.
    pub can_generate_invoice: bool,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role, can_generate_invoice: bool) -> Self {
        Actor {
            user_id: user_id.into(),
            role,
            can_generate_invoice,
        }
    }

    /// Checks that this actor may create invoices.
    pub fn authorize_invoice(&self) -> CoreResult<()> {
        if self.role == Role::Admin || self.can_generate_invoice {
            Ok(())
        } else {
            Err(CoreError::UnauthorizedInvoiceGeneration {
                user_id: self.user_id.clone(),
            })
        }
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Delivery state of an invoice.
///
/// ```text
/// Pending ──verify OTP──► Delivered
///    │                        │
///    └──── fully returned ────┴──► Returned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Returned,
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        DeliveryStatus::Pending
    }
}

/// Proof captured by the delivery agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryProof {
    pub photo_url: Option<String>,
    pub signature: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub note: Option<String>,
}

// =============================================================================
// Invoice
// =============================================================================

/// A sale invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub rep_id: Option<String>,
    /// Operator who created the invoice.
    pub user_id: String,
    pub subtotal_paise: i64,
    pub gst_paise: i64,
    pub discount_paise: i64,
    pub net_paise: i64,
    pub is_cash: bool,
    pub delivery_status: DeliveryStatus,
    /// Never leaves the process in serialized form.
    #[serde(skip_serializing, default)]
    pub delivery_otp: String,
    pub delivery_photo_url: Option<String>,
    pub delivery_signature: Option<String>,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub delivery_note: Option<String>,
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Invoice {
    #[inline]
    pub fn net_amount(&self) -> Money {
        Money::from_paise(self.net_paise)
    }

    /// Returns the proof fields captured on delivery.
    pub fn delivery_proof(&self) -> DeliveryProof {
        DeliveryProof {
            photo_url: self.delivery_photo_url.clone(),
            signature: self.delivery_signature.clone(),
            latitude: self.delivery_latitude,
            longitude: self.delivery_longitude,
            note: self.delivery_note.clone(),
        }
    }
}

/// A line on an invoice, fulfilled from exactly one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub line_no: i64,
    pub product_id: String,
    pub batch_id: String,
    pub product_name: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    pub unit_price_paise: i64,
    pub gst_rate_bps: u32,
    pub line_subtotal_paise: i64,
    pub gst_paise: i64,
    pub line_total_paise: i64,
    /// Sum of all sales-return quantities against this line.
    pub returned_quantity: i64,
}

impl InvoiceItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_paise(self.unit_price_paise)
    }

    #[inline]
    pub fn gst_rate(&self) -> GstRate {
        GstRate::from_bps(self.gst_rate_bps)
    }

    /// Quantity that can still be returned.
    #[inline]
    pub fn returnable(&self) -> i64 {
        self.quantity - self.returned_quantity
    }

    pub fn amounts(&self) -> LineAmounts {
        LineAmounts {
            line_subtotal: Money::from_paise(self.line_subtotal_paise),
            gst_amount: Money::from_paise(self.gst_paise),
            line_total: Money::from_paise(self.line_total_paise),
        }
    }
}

// =============================================================================
// Purchase
// =============================================================================

/// A purchase bill received from a supplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: String,
    pub bill_number: String,
    pub supplier_id: String,
    /// The supplier's own invoice number, if captured.
    pub supplier_reference: Option<String>,
    pub subtotal_paise: i64,
    pub gst_paise: i64,
    pub total_paise: i64,
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_paise(self.total_paise)
    }
}

/// A purchase line; each one creates its own batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub line_no: i64,
    pub product_id: String,
    pub batch_id: String,
    pub product_name: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    pub purchase_price_paise: i64,
    pub sale_price_paise: i64,
    pub gst_rate_bps: u32,
    pub line_subtotal_paise: i64,
    pub gst_paise: i64,
    pub line_total_paise: i64,
    pub returned_quantity: i64,
}

impl PurchaseItem {
    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_paise(self.purchase_price_paise)
    }

    #[inline]
    pub fn gst_rate(&self) -> GstRate {
        GstRate::from_bps(self.gst_rate_bps)
    }

    #[inline]
    pub fn returnable(&self) -> i64 {
        self.quantity - self.returned_quantity
    }
}

// =============================================================================
// Returns
// =============================================================================

/// A sales return (credit note) against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesReturn {
    pub id: String,
    pub return_number: String,
    pub invoice_id: String,
    pub customer_id: String,
    pub subtotal_paise: i64,
    pub gst_paise: i64,
    /// Part of the invoice discount given back with these goods.
    pub discount_paise: i64,
    /// subtotal + GST - discount; the amount credited to the customer.
    pub total_paise: i64,
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesReturnItem {
    pub id: String,
    pub return_id: String,
    pub invoice_item_id: String,
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i64,
    pub reason: String,
    pub unit_price_paise: i64,
    pub gst_rate_bps: u32,
    pub line_subtotal_paise: i64,
    pub gst_paise: i64,
    pub line_total_paise: i64,
}

/// A purchase return (debit note) against a purchase bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseReturn {
    pub id: String,
    pub return_number: String,
    pub purchase_id: String,
    pub supplier_id: String,
    pub subtotal_paise: i64,
    pub gst_paise: i64,
    pub total_paise: i64,
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseReturnItem {
    pub id: String,
    pub return_id: String,
    pub purchase_item_id: String,
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i64,
    pub reason: String,
    pub purchase_price_paise: i64,
    pub gst_rate_bps: u32,
    pub line_subtotal_paise: i64,
    pub gst_paise: i64,
    pub line_total_paise: i64,
}

// =============================================================================
// Journals
// =============================================================================

/// Why a batch's stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockMovementReason {
    Purchase,
    Sale,
    SalesReturn,
    PurchaseReturn,
}

/// One entry in the stock journal. A batch's stock is the sum of its deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub batch_id: String,
    pub delta: i64,
    pub reason: StockMovementReason,
    pub document_id: String,
    pub created_at: DateTime<Utc>,
}

/// One entry in the party balance journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BalanceEntry {
    pub id: String,
    pub party_id: String,
    pub delta_paise: i64,
    pub document_kind: DocumentKind,
    pub document_id: String,
    pub balance_after_paise: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Notification Outbox
// =============================================================================

/// A post-commit notification waiting to be dispatched.
///
/// Written in the same transaction as the document it belongs to, so a
/// notification exists if and only if the document was committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OutboxEntry {
    pub id: String,
    /// "DELIVERY_OTP", "HIGH_VALUE_ALERT", ...
    pub kind: String,
    pub entity_id: String,
    /// JSON body understood by the notifier.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(expiry: NaiveDate, stock: i64) -> Batch {
        Batch {
            id: "b1".to_string(),
            product_id: "p1".to_string(),
            batch_number: "AX12".to_string(),
            expiry_date: expiry,
            purchase_price_paise: 800,
            sale_price_paise: 1000,
            gst_rate_bps: 1200,
            current_stock: stock,
            receipt_seq: 1,
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_gst_rate_units() {
        assert_eq!(GstRate::from_percent(12).bps(), 1200);
        assert_eq!(GstRate::from_bps(250).to_string(), "2.50%");
        assert!(GstRate::default().is_zero());
    }

    #[test]
    fn test_batch_expiring_today_is_expired() {
        let b = batch(date(2025, 1, 31), 10);
        assert!(b.is_expired(date(2025, 1, 31)));
        assert!(!b.is_expired(date(2025, 1, 30)));
    }

    #[test]
    fn test_batch_can_fulfil() {
        let b = batch(date(2025, 6, 30), 10);
        assert!(b.can_fulfil(10, date(2025, 1, 1)));
        assert!(!b.can_fulfil(11, date(2025, 1, 1)));
        assert!(!b.can_fulfil(1, date(2025, 7, 1)));
    }

    #[test]
    fn test_actor_authorization() {
        assert!(Actor::new("u1", Role::Admin, false).authorize_invoice().is_ok());
        assert!(Actor::new("u2", Role::Operator, true).authorize_invoice().is_ok());
        let err = Actor::new("u3", Role::Delivery, false)
            .authorize_invoice()
            .unwrap_err();
        assert!(matches!(err, CoreError::UnauthorizedInvoiceGeneration { .. }));
    }

    #[test]
    fn test_invoice_otp_not_serialized() {
        let invoice = Invoice {
            id: "i1".to_string(),
            invoice_number: "INV-202501-000001".to_string(),
            customer_id: "c1".to_string(),
            rep_id: None,
            user_id: "u1".to_string(),
            subtotal_paise: 100,
            gst_paise: 12,
            discount_paise: 0,
            net_paise: 112,
            is_cash: false,
            delivery_status: DeliveryStatus::Pending,
            delivery_otp: "123456".to_string(),
            delivery_photo_url: None,
            delivery_signature: None,
            delivery_latitude: None,
            delivery_longitude: None,
            delivery_note: None,
            business_date: date(2025, 1, 1),
            created_at: Utc::now(),
            delivered_at: None,
        };
        let json = serde_json::to_string(&invoice).unwrap();
        assert!(!json.contains("123456"));
        assert!(json.contains("\"delivery_status\":\"pending\""));
    }

    #[test]
    fn test_delivery_status_default() {
        assert_eq!(DeliveryStatus::default(), DeliveryStatus::Pending);
    }
}
