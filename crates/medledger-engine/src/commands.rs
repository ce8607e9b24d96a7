//! # Commands
//!
//! Typed inputs for every engine operation. Each command validates its own
//! shape before the engine opens a transaction; anything that needs the
//! database (existence, stock, returned quantities) is checked inside the
//! unit of work.
//!
//! ```text
//! caller ──► CreateInvoice { customer_id, actor, lines[], is_cash, discount }
//!                 │
//!                 ├── validate()          shape only, no I/O
//!                 ├── actor.authorize()   before BEGIN
//!                 ▼
//!            TransactionEngine::create_sale
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use medledger_core::validation::{
    validate_batch_number, validate_discount_paise, validate_gst_rate_bps, validate_line_count,
    validate_otp_format, validate_price_paise, validate_quantity, validate_reason,
    validate_required, validate_unique_ids, ValidationResult,
};
use medledger_core::{
    Actor, DeliveryProof, GstRate, Invoice, InvoiceItem, Money, Purchase, PurchaseItem,
    PurchaseReturn, PurchaseReturnItem, SalesReturn, SalesReturnItem,
};

// =============================================================================
// Sale
// =============================================================================

/// One line of a sale. Without `batch_id` the batch is chosen FEFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub batch_id: Option<String>,
}

impl SaleLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLine {
            product_id: product_id.into(),
            quantity,
            batch_id: None,
        }
    }

    /// Pins the line to a specific batch instead of FEFO.
    pub fn from_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub customer_id: String,
    /// Sales representative credited with the sale.
    #[serde(default)]
    pub rep_id: Option<String>,
    /// The authenticated user issuing the invoice. Mandatory.
    pub actor: Actor,
    pub lines: Vec<SaleLine>,
    pub is_cash: bool,
    /// Post-tax document discount.
    #[serde(default)]
    pub discount: Money,
}

impl CreateInvoice {
    pub fn validate(&self, max_lines: usize) -> ValidationResult<()> {
        validate_required("actor.user_id", &self.actor.user_id)?;
        validate_required("customer_id", &self.customer_id)?;
        validate_line_count(self.lines.len(), max_lines)?;
        validate_discount_paise(self.discount.paise())?;

        for line in &self.lines {
            validate_required("product_id", &line.product_id)?;
            validate_quantity(line.quantity)?;
            if let Some(batch_id) = &line.batch_id {
                validate_required("batch_id", batch_id)?;
            }
        }

        Ok(())
    }
}

/// A committed invoice with its lines.
#[derive(Debug, Clone)]
pub struct PostedInvoice {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

// =============================================================================
// Purchase
// =============================================================================

/// One received lot. Each line becomes a new batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product_id: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    pub purchase_price: Money,
    pub sale_price: Money,
    /// Falls back to the product's default rate.
    #[serde(default)]
    pub gst_rate: Option<GstRate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPurchase {
    pub supplier_id: String,
    /// The supplier's own bill number.
    #[serde(default)]
    pub supplier_reference: Option<String>,
    pub lines: Vec<PurchaseLine>,
}

impl RecordPurchase {
    pub fn validate(&self, max_lines: usize) -> ValidationResult<()> {
        validate_required("supplier_id", &self.supplier_id)?;
        validate_line_count(self.lines.len(), max_lines)?;

        for line in &self.lines {
            validate_required("product_id", &line.product_id)?;
            validate_batch_number(&line.batch_number)?;
            validate_quantity(line.quantity)?;
            validate_price_paise("purchase_price", line.purchase_price.paise())?;
            validate_price_paise("sale_price", line.sale_price.paise())?;
            if let Some(rate) = line.gst_rate {
                validate_gst_rate_bps(rate.bps())?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostedPurchase {
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}

// =============================================================================
// Returns
// =============================================================================

/// One returned line, referencing the original document line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLine {
    pub item_id: String,
    pub quantity: i64,
    pub reason: String,
}

impl ReturnLine {
    pub fn new(item_id: impl Into<String>, quantity: i64, reason: impl Into<String>) -> Self {
        ReturnLine {
            item_id: item_id.into(),
            quantity,
            reason: reason.into(),
        }
    }
}

fn validate_return_lines(lines: &[ReturnLine], max_lines: usize) -> ValidationResult<()> {
    validate_line_count(lines.len(), max_lines)?;
    validate_unique_ids("item_id", lines.iter().map(|l| l.item_id.as_str()))?;

    for line in lines {
        validate_required("item_id", &line.item_id)?;
        validate_quantity(line.quantity)?;
        validate_reason(&line.reason)?;
    }

    Ok(())
}

/// Sales return against an invoice (issues a credit note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSalesReturn {
    pub invoice_id: String,
    pub lines: Vec<ReturnLine>,
}

impl CreateSalesReturn {
    pub fn validate(&self, max_lines: usize) -> ValidationResult<()> {
        validate_required("invoice_id", &self.invoice_id)?;
        validate_return_lines(&self.lines, max_lines)
    }
}

#[derive(Debug, Clone)]
pub struct PostedSalesReturn {
    pub credit_note: SalesReturn,
    pub items: Vec<SalesReturnItem>,
}

/// Purchase return against a bill (issues a debit note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseReturn {
    pub purchase_id: String,
    pub lines: Vec<ReturnLine>,
}

impl CreatePurchaseReturn {
    pub fn validate(&self, max_lines: usize) -> ValidationResult<()> {
        validate_required("purchase_id", &self.purchase_id)?;
        validate_return_lines(&self.lines, max_lines)
    }
}

#[derive(Debug, Clone)]
pub struct PostedPurchaseReturn {
    pub debit_note: PurchaseReturn,
    pub items: Vec<PurchaseReturnItem>,
}

// =============================================================================
// Delivery
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyDelivery {
    pub invoice_id: String,
    pub otp: String,
    #[serde(default)]
    pub proof: DeliveryProof,
}

impl VerifyDelivery {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("invoice_id", &self.invoice_id)?;
        validate_otp_format(&self.otp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medledger_core::{Role, ValidationError};

    fn invoice(lines: Vec<SaleLine>) -> CreateInvoice {
        CreateInvoice {
            customer_id: "cust-1".into(),
            rep_id: None,
            actor: Actor::new("usr-1", Role::SalesRep, true),
            lines,
            is_cash: false,
            discount: Money::zero(),
        }
    }

    #[test]
    fn test_invoice_requires_actor() {
        let mut cmd = invoice(vec![SaleLine::new("p1", 1)]);
        cmd.actor.user_id = "  ".into();
        assert!(matches!(
            cmd.validate(200),
            Err(ValidationError::Required { field }) if field == "actor.user_id"
        ));
    }

    #[test]
    fn test_invoice_line_rules() {
        assert!(invoice(vec![]).validate(200).is_err());
        assert!(invoice(vec![SaleLine::new("p1", 0)]).validate(200).is_err());
        assert!(invoice(vec![SaleLine::new("p1", 2), SaleLine::new("p2", 1)])
            .validate(1)
            .is_err());

        let mut cmd = invoice(vec![SaleLine::new("p1", 2).from_batch("b1")]);
        assert!(cmd.validate(200).is_ok());
        cmd.discount = Money::from_paise(-1);
        assert!(cmd.validate(200).is_err());
    }

    #[test]
    fn test_return_lines_must_be_unique() {
        let cmd = CreateSalesReturn {
            invoice_id: "inv-1".into(),
            lines: vec![
                ReturnLine::new("item-1", 1, "damaged"),
                ReturnLine::new("item-1", 1, "damaged"),
            ],
        };
        assert!(matches!(
            cmd.validate(200),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_verify_delivery_otp_shape() {
        let mut cmd = VerifyDelivery {
            invoice_id: "inv-1".into(),
            otp: "12345".into(),
            proof: DeliveryProof::default(),
        };
        assert!(cmd.validate().is_err());
        cmd.otp = "123456".into();
        assert!(cmd.validate().is_ok());
    }
}
