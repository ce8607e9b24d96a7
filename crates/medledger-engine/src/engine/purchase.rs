//! Purchase bills. Every line receives a new batch.

use tracing::info;
use uuid::Uuid;

use medledger_core::pricing::{compute_line, DocumentTotals};
use medledger_core::validation::validate_expiry_date;
use medledger_core::{CoreError, DocumentKind, PartyKind, Purchase, PurchaseItem};
use medledger_db::{
    BatchDetails, BatchLedger, DocumentNumbering, PartyRepository, ProductRepository,
    PurchaseRepository,
};

use super::TransactionEngine;
use crate::commands::{PostedPurchase, RecordPurchase};
use crate::error::LedgerResult;
use crate::events::{DocumentSummary, LedgerEvent};

impl TransactionEngine {
    /// Records goods received from a supplier.
    ///
    /// Lines are priced at the purchase price; the supplier's balance grows
    /// by the bill total.
    ///
    /// ## Errors
    /// - `SupplierNotFound`, `ProductNotFound`
    /// - `Validation` for a lot that is already expired on receipt
    pub async fn record_purchase(&self, cmd: RecordPurchase) -> LedgerResult<PostedPurchase> {
        cmd.validate(self.settings.max_document_lines)?;

        let as_of = self.clock.today();
        for line in &cmd.lines {
            validate_expiry_date(line.expiry_date, as_of)?;
        }

        let (this, cmd_ref) = (self, &cmd);
        let posted = self
            .run_unit("record_purchase", move || this.record_purchase_once(cmd_ref))
            .await?;

        let receivers = self
            .events
            .publish(LedgerEvent::PurchaseRecorded(DocumentSummary::from(&posted.purchase)));

        info!(
            bill_number = %posted.purchase.bill_number,
            supplier_id = %posted.purchase.supplier_id,
            total = %posted.purchase.total_amount(),
            lines = posted.items.len(),
            receivers,
            "Purchase recorded"
        );

        Ok(posted)
    }

    async fn record_purchase_once(&self, cmd: &RecordPurchase) -> LedgerResult<PostedPurchase> {
        let as_of = self.clock.today();
        let purchase_id = Uuid::new_v4().to_string();

        let mut tx = self.db.begin().await?;

        let supplier =
            PartyRepository::find_of_kind(&mut *tx, &cmd.supplier_id, PartyKind::Supplier)
                .await?
                .ok_or_else(|| CoreError::SupplierNotFound(cmd.supplier_id.clone()))?;

        let mut items = Vec::with_capacity(cmd.lines.len());
        let mut amounts = Vec::with_capacity(cmd.lines.len());

        for (idx, line) in cmd.lines.iter().enumerate() {
            let product = ProductRepository::find(&mut *tx, &line.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            let gst_rate = line.gst_rate.unwrap_or_else(|| product.default_gst_rate());
            let details = BatchDetails {
                batch_number: line.batch_number.clone(),
                expiry_date: line.expiry_date,
                purchase_price: line.purchase_price,
                sale_price: line.sale_price,
                gst_rate,
            };

            let batch =
                BatchLedger::receive_stock(&mut tx, &product.id, &details, line.quantity, &purchase_id)
                    .await?;

            let line_amounts = compute_line(line.quantity, line.purchase_price, gst_rate)?;

            items.push(PurchaseItem {
                id: Uuid::new_v4().to_string(),
                purchase_id: purchase_id.clone(),
                line_no: idx as i64 + 1,
                product_id: product.id,
                batch_id: batch.id,
                product_name: product.name,
                batch_number: batch.batch_number,
                expiry_date: batch.expiry_date,
                quantity: line.quantity,
                purchase_price_paise: line.purchase_price.paise(),
                sale_price_paise: line.sale_price.paise(),
                gst_rate_bps: gst_rate.bps(),
                line_subtotal_paise: line_amounts.line_subtotal.paise(),
                gst_paise: line_amounts.gst_amount.paise(),
                line_total_paise: line_amounts.line_total.paise(),
                returned_quantity: 0,
            });
            amounts.push(line_amounts);
        }

        let totals = DocumentTotals::undiscounted(&amounts)?;

        PartyRepository::adjust_balance(
            &mut tx,
            &supplier.id,
            totals.net_amount,
            DocumentKind::PurchaseBill,
            &purchase_id,
        )
        .await?;

        let bill_number =
            DocumentNumbering::allocate(&mut tx, DocumentKind::PurchaseBill, as_of).await?;

        let purchase = Purchase {
            id: purchase_id,
            bill_number,
            supplier_id: supplier.id,
            supplier_reference: cmd.supplier_reference.clone(),
            subtotal_paise: totals.subtotal.paise(),
            gst_paise: totals.total_gst.paise(),
            total_paise: totals.net_amount.paise(),
            business_date: as_of,
            created_at: self.clock.now(),
        };
        PurchaseRepository::insert(&mut tx, &purchase, &items).await?;

        tx.commit().await?;

        Ok(PostedPurchase { purchase, items })
    }
}
