//! Sales returns (credit notes) and purchase returns (debit notes).
//!
//! Returned lines are valued at the original line's unit price and GST
//! rate. A credit note gives back the returned goods' share of the invoice
//! discount, so the credits against an invoice add up to its net amount.
//!
//! ```text
//!                    stock             balance            bound
//! sales return       batch += qty      customer -= total  returned ≤ sold
//! purchase return    batch -= qty      supplier -= total  returned ≤ received
//!                    (CAS, may fail)
//! ```

use tracing::info;
use uuid::Uuid;

use medledger_core::pricing::{compute_line, prorate_discount, DocumentTotals, LineAmounts};
use medledger_core::{
    CoreError, DocumentKind, Invoice, Money, PurchaseReturn, PurchaseReturnItem, SalesReturn,
    SalesReturnItem, StockMovementReason,
};
use medledger_db::{
    BatchLedger, DocumentNumbering, InvoiceRepository, PartyRepository, PurchaseRepository,
    ReturnRepository,
};
use sqlx::{Sqlite, Transaction};

use super::TransactionEngine;
use crate::commands::{
    CreatePurchaseReturn, CreateSalesReturn, PostedPurchaseReturn, PostedSalesReturn,
};
use crate::error::LedgerResult;
use crate::events::{DocumentSummary, LedgerEvent};

impl TransactionEngine {
    // =========================================================================
    // Sales Return
    // =========================================================================

    /// Takes goods back from a customer against an invoice.
    ///
    /// The credit note is applied to the customer's balance for cash and
    /// credit invoices alike. A cash invoice never raised the balance, so
    /// its credit notes take the balance below zero: that negative amount is
    /// store credit owed to the customer, not a receivable. The invoice
    /// becomes `Returned` once every line is fully returned.
    ///
    /// The credit note total is the returned goods' price and GST less their
    /// prorated share of the invoice discount.
    ///
    /// ## Errors
    /// - `SaleNotFound`, `ItemNotInSale`
    /// - `ReturnQuantityExceedsOriginal` when cumulative returns would pass
    ///   the sold quantity
    pub async fn create_sales_return(
        &self,
        cmd: CreateSalesReturn,
    ) -> LedgerResult<PostedSalesReturn> {
        cmd.validate(self.settings.max_document_lines)?;

        let (this, cmd_ref) = (self, &cmd);
        let posted = self
            .run_unit("create_sales_return", move || {
                this.create_sales_return_once(cmd_ref)
            })
            .await?;

        let receivers = self.events.publish(LedgerEvent::SalesReturnCreated(
            DocumentSummary::from(&posted.credit_note),
        ));

        info!(
            return_number = %posted.credit_note.return_number,
            invoice_id = %posted.credit_note.invoice_id,
            total_paise = posted.credit_note.total_paise,
            lines = posted.items.len(),
            receivers,
            "Sales return created"
        );

        Ok(posted)
    }

    async fn create_sales_return_once(
        &self,
        cmd: &CreateSalesReturn,
    ) -> LedgerResult<PostedSalesReturn> {
        let as_of = self.clock.today();
        let return_id = Uuid::new_v4().to_string();

        let mut tx = self.db.begin().await?;

        let invoice = InvoiceRepository::find(&mut *tx, &cmd.invoice_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(cmd.invoice_id.clone()))?;
        let sold = InvoiceRepository::items(&mut *tx, &invoice.id).await?;

        let mut items = Vec::with_capacity(cmd.lines.len());
        let mut amounts = Vec::with_capacity(cmd.lines.len());

        for line in &cmd.lines {
            let original = sold
                .iter()
                .find(|i| i.id == line.item_id)
                .ok_or_else(|| CoreError::ItemNotInSale {
                    sale_id: invoice.id.clone(),
                    item_id: line.item_id.clone(),
                })?;

            InvoiceRepository::record_return(&mut tx, original, line.quantity).await?;
            BatchLedger::release_stock(
                &mut tx,
                &original.batch_id,
                line.quantity,
                StockMovementReason::SalesReturn,
                &return_id,
            )
            .await?;

            let line_amounts =
                compute_line(line.quantity, original.unit_price(), original.gst_rate())?;

            items.push(SalesReturnItem {
                id: Uuid::new_v4().to_string(),
                return_id: return_id.clone(),
                invoice_item_id: original.id.clone(),
                product_id: original.product_id.clone(),
                batch_id: original.batch_id.clone(),
                quantity: line.quantity,
                reason: line.reason.trim().to_string(),
                unit_price_paise: original.unit_price_paise,
                gst_rate_bps: original.gst_rate_bps,
                line_subtotal_paise: line_amounts.line_subtotal.paise(),
                gst_paise: line_amounts.gst_amount.paise(),
                line_total_paise: line_amounts.line_total.paise(),
            });
            amounts.push(line_amounts);
        }

        let fully_returned =
            InvoiceRepository::mark_returned_if_complete(&mut tx, &invoice.id).await?;
        let totals =
            Self::credit_note_totals(&mut tx, &invoice, &amounts, fully_returned).await?;

        PartyRepository::adjust_balance(
            &mut tx,
            &invoice.customer_id,
            -totals.net_amount,
            DocumentKind::CreditNote,
            &return_id,
        )
        .await?;

        let return_number =
            DocumentNumbering::allocate(&mut tx, DocumentKind::CreditNote, as_of).await?;

        let credit_note = SalesReturn {
            id: return_id,
            return_number,
            invoice_id: invoice.id.clone(),
            customer_id: invoice.customer_id.clone(),
            subtotal_paise: totals.subtotal.paise(),
            gst_paise: totals.total_gst.paise(),
            discount_paise: totals.discount.paise(),
            total_paise: totals.net_amount.paise(),
            business_date: as_of,
            created_at: self.clock.now(),
        };
        ReturnRepository::insert_sales_return(&mut tx, &credit_note, &items).await?;

        if fully_returned {
            info!(invoice_number = %invoice.invoice_number, "Invoice fully returned");
        }

        tx.commit().await?;

        Ok(PostedSalesReturn { credit_note, items })
    }

    /// Values returned goods net of the invoice discount they carried.
    ///
    /// The note that completes the return takes whatever discount earlier
    /// notes left over, and no note takes the cumulative credit past the
    /// invoice's net amount.
    async fn credit_note_totals(
        tx: &mut Transaction<'_, Sqlite>,
        invoice: &Invoice,
        lines: &[LineAmounts],
        fully_returned: bool,
    ) -> LedgerResult<DocumentTotals> {
        let returned = DocumentTotals::undiscounted(lines)?.gross();
        let (credited, discount_given) =
            ReturnRepository::credited_against_invoice(&mut **tx, &invoice.id).await?;

        let invoice_discount = Money::from_paise(invoice.discount_paise);
        let share = if fully_returned {
            invoice_discount - discount_given
        } else {
            let invoice_gross = Money::from_paise(invoice.subtotal_paise + invoice.gst_paise);
            prorate_discount(invoice_discount, returned, invoice_gross)
        };

        let remaining = invoice.net_amount() - credited;
        let share = share.max(returned - remaining).clamp(Money::zero(), returned);

        Ok(DocumentTotals::from_lines(lines, share)?)
    }

    // =========================================================================
    // Purchase Return
    // =========================================================================

    /// Sends goods back to a supplier against a purchase bill.
    ///
    /// ## Errors
    /// - `PurchaseNotFound`, `ItemNotInPurchase`
    /// - `ReturnQuantityExceedsOriginal`
    /// - `InsufficientStockForReturn` when the batch no longer holds the
    ///   quantity (it was sold meanwhile)
    pub async fn create_purchase_return(
        &self,
        cmd: CreatePurchaseReturn,
    ) -> LedgerResult<PostedPurchaseReturn> {
        cmd.validate(self.settings.max_document_lines)?;

        let (this, cmd_ref) = (self, &cmd);
        let posted = self
            .run_unit("create_purchase_return", move || {
                this.create_purchase_return_once(cmd_ref)
            })
            .await?;

        let receivers = self.events.publish(LedgerEvent::PurchaseReturnCreated(
            DocumentSummary::from(&posted.debit_note),
        ));

        info!(
            return_number = %posted.debit_note.return_number,
            purchase_id = %posted.debit_note.purchase_id,
            total_paise = posted.debit_note.total_paise,
            lines = posted.items.len(),
            receivers,
            "Purchase return created"
        );

        Ok(posted)
    }

    async fn create_purchase_return_once(
        &self,
        cmd: &CreatePurchaseReturn,
    ) -> LedgerResult<PostedPurchaseReturn> {
        let as_of = self.clock.today();
        let return_id = Uuid::new_v4().to_string();

        let mut tx = self.db.begin().await?;

        let purchase = PurchaseRepository::find(&mut *tx, &cmd.purchase_id)
            .await?
            .ok_or_else(|| CoreError::PurchaseNotFound(cmd.purchase_id.clone()))?;
        let received = PurchaseRepository::items(&mut *tx, &purchase.id).await?;

        let mut items = Vec::with_capacity(cmd.lines.len());
        let mut amounts = Vec::with_capacity(cmd.lines.len());

        for line in &cmd.lines {
            let original = received
                .iter()
                .find(|i| i.id == line.item_id)
                .ok_or_else(|| CoreError::ItemNotInPurchase {
                    purchase_id: purchase.id.clone(),
                    item_id: line.item_id.clone(),
                })?;

            PurchaseRepository::record_return(&mut tx, original, line.quantity).await?;
            BatchLedger::reserve_stock(
                &mut tx,
                &original.batch_id,
                line.quantity,
                StockMovementReason::PurchaseReturn,
                &return_id,
            )
            .await?;

            let line_amounts =
                compute_line(line.quantity, original.purchase_price(), original.gst_rate())?;

            items.push(PurchaseReturnItem {
                id: Uuid::new_v4().to_string(),
                return_id: return_id.clone(),
                purchase_item_id: original.id.clone(),
                product_id: original.product_id.clone(),
                batch_id: original.batch_id.clone(),
                quantity: line.quantity,
                reason: line.reason.trim().to_string(),
                purchase_price_paise: original.purchase_price_paise,
                gst_rate_bps: original.gst_rate_bps,
                line_subtotal_paise: line_amounts.line_subtotal.paise(),
                gst_paise: line_amounts.gst_amount.paise(),
                line_total_paise: line_amounts.line_total.paise(),
            });
            amounts.push(line_amounts);
        }

        let totals = DocumentTotals::undiscounted(&amounts)?;

        PartyRepository::adjust_balance(
            &mut tx,
            &purchase.supplier_id,
            -totals.net_amount,
            DocumentKind::DebitNote,
            &return_id,
        )
        .await?;

        let return_number =
            DocumentNumbering::allocate(&mut tx, DocumentKind::DebitNote, as_of).await?;

        let debit_note = PurchaseReturn {
            id: return_id,
            return_number,
            purchase_id: purchase.id.clone(),
            supplier_id: purchase.supplier_id.clone(),
            subtotal_paise: totals.subtotal.paise(),
            gst_paise: totals.total_gst.paise(),
            total_paise: totals.net_amount.paise(),
            business_date: as_of,
            created_at: self.clock.now(),
        };
        ReturnRepository::insert_purchase_return(&mut tx, &debit_note, &items).await?;

        tx.commit().await?;

        Ok(PostedPurchaseReturn { debit_note, items })
    }
}
