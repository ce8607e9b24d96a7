//! Sale invoices.
//!
//! ```text
//! CreateInvoice
//!   │ validate, authorize actor
//!   ▼
//! BEGIN
//!   customer must exist
//!   per line: product → batch (explicit or FEFO) → stock CAS → price
//!   totals (post-tax discount)
//!   credit sale: customer balance += net
//!   INV number, header + lines
//!   outbox: DELIVERY_OTP, HIGH_VALUE_ALERT when net ≥ threshold
//! COMMIT → InvoiceCreated
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use medledger_core::fefo;
use medledger_core::pricing::{compute_line, DocumentTotals};
use medledger_core::{
    Batch, CoreError, DeliveryStatus, DocumentKind, Invoice, InvoiceItem, PartyKind,
    StockMovementReason,
};
use medledger_db::{
    BatchLedger, DocumentNumbering, InvoiceRepository, NotificationOutboxRepository,
    PartyRepository, ProductRepository,
};
use sqlx::{Sqlite, Transaction};

use super::delivery::generate_otp;
use super::TransactionEngine;
use crate::commands::{CreateInvoice, PostedInvoice, SaleLine};
use crate::error::LedgerResult;
use crate::events::{InvoiceSummary, LedgerEvent};
use crate::notify::Notification;

impl TransactionEngine {
    /// Creates a sale invoice.
    ///
    /// ## Errors
    /// - `UnauthorizedInvoiceGeneration` if the actor may not invoice
    /// - `CustomerNotFound`, `ProductNotFound`, `BatchNotFound`
    /// - `InsufficientStock` when no single non-expired batch can fulfil a
    ///   line, `BatchExpired` / `BatchProductMismatch` for a pinned batch
    /// - `DiscountExceedsTotal`
    ///
    /// On any error nothing is written.
    pub async fn create_sale(&self, cmd: CreateInvoice) -> LedgerResult<PostedInvoice> {
        cmd.validate(self.settings.max_document_lines)?;
        cmd.actor.authorize_invoice()?;

        let otp = generate_otp();
        let (this, cmd_ref, otp_ref) = (self, &cmd, otp.as_str());
        let posted = self
            .run_unit("create_sale", move || this.create_sale_once(cmd_ref, otp_ref))
            .await?;

        let receivers = self.events.publish(LedgerEvent::InvoiceCreated(InvoiceSummary::new(
            &posted.invoice,
            posted.items.len(),
        )));

        info!(
            invoice_number = %posted.invoice.invoice_number,
            customer_id = %posted.invoice.customer_id,
            net = %posted.invoice.net_amount(),
            lines = posted.items.len(),
            is_cash = posted.invoice.is_cash,
            receivers,
            "Invoice created"
        );

        Ok(posted)
    }

    async fn create_sale_once(&self, cmd: &CreateInvoice, otp: &str) -> LedgerResult<PostedInvoice> {
        let as_of = self.clock.today();
        let now = self.clock.now();
        let invoice_id = Uuid::new_v4().to_string();

        let mut tx = self.db.begin().await?;

        let customer =
            PartyRepository::find_of_kind(&mut *tx, &cmd.customer_id, PartyKind::Customer)
                .await?
                .ok_or_else(|| CoreError::CustomerNotFound(cmd.customer_id.clone()))?;

        let mut items = Vec::with_capacity(cmd.lines.len());
        for (idx, line) in cmd.lines.iter().enumerate() {
            let item = Self::fulfil_line(&mut tx, &invoice_id, idx, line, as_of).await?;
            items.push(item);
        }

        let amounts: Vec<_> = items.iter().map(InvoiceItem::amounts).collect();
        let totals = DocumentTotals::from_lines(&amounts, cmd.discount)?;

        if !cmd.is_cash {
            PartyRepository::adjust_balance(
                &mut tx,
                &customer.id,
                totals.net_amount,
                DocumentKind::Invoice,
                &invoice_id,
            )
            .await?;
        }

        let invoice_number = DocumentNumbering::allocate(&mut tx, DocumentKind::Invoice, as_of).await?;

        let invoice = build_invoice(
            invoice_id,
            invoice_number,
            cmd,
            &totals,
            otp,
            as_of,
            now,
        );
        InvoiceRepository::insert(&mut tx, &invoice, &items).await?;

        let sms = Notification::DeliveryOtp {
            invoice_id: invoice.id.clone(),
            invoice_number: invoice.invoice_number.clone(),
            customer_name: customer.name.clone(),
            phone: customer.phone.clone(),
            otp: otp.to_string(),
        };
        NotificationOutboxRepository::enqueue(&mut tx, sms.kind(), &invoice.id, &sms).await?;

        if let Some(email) = self.high_value_recipient(totals.net_amount) {
            let alert = Notification::HighValueAlert {
                invoice_id: invoice.id.clone(),
                invoice_number: invoice.invoice_number.clone(),
                customer_name: customer.name.clone(),
                net_paise: totals.net_amount.paise(),
                email: email.to_string(),
            };
            NotificationOutboxRepository::enqueue(&mut tx, alert.kind(), &invoice.id, &alert)
                .await?;
        }

        tx.commit().await?;

        Ok(PostedInvoice { invoice, items })
    }

    /// Picks the batch for one line, takes its stock and prices it.
    async fn fulfil_line(
        tx: &mut Transaction<'_, Sqlite>,
        invoice_id: &str,
        idx: usize,
        line: &SaleLine,
        as_of: NaiveDate,
    ) -> LedgerResult<InvoiceItem> {
        let product = ProductRepository::find(&mut **tx, &line.product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        let batch: Batch = match &line.batch_id {
            Some(batch_id) => {
                let batch = BatchLedger::find(&mut **tx, batch_id)
                    .await?
                    .ok_or_else(|| CoreError::BatchNotFound(batch_id.clone()))?;
                fefo::validate_batch(&product, &batch, line.quantity, as_of)?;
                batch
            }
            None => {
                let candidates = BatchLedger::list_sellable(&mut **tx, &product.id, as_of).await?;
                fefo::select_batch(&product, &candidates, line.quantity, as_of)?.clone()
            }
        };

        BatchLedger::reserve_stock(
            tx,
            &batch.id,
            line.quantity,
            StockMovementReason::Sale,
            invoice_id,
        )
        .await?;

        let amounts = compute_line(line.quantity, batch.sale_price(), batch.gst_rate())?;

        Ok(InvoiceItem {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            line_no: idx as i64 + 1,
            product_id: product.id,
            batch_id: batch.id,
            product_name: product.name,
            batch_number: batch.batch_number,
            expiry_date: batch.expiry_date,
            quantity: line.quantity,
            unit_price_paise: batch.sale_price_paise,
            gst_rate_bps: batch.gst_rate_bps,
            line_subtotal_paise: amounts.line_subtotal.paise(),
            gst_paise: amounts.gst_amount.paise(),
            line_total_paise: amounts.line_total.paise(),
            returned_quantity: 0,
        })
    }
}

fn build_invoice(
    id: String,
    invoice_number: String,
    cmd: &CreateInvoice,
    totals: &DocumentTotals,
    otp: &str,
    business_date: NaiveDate,
    created_at: DateTime<Utc>,
) -> Invoice {
    Invoice {
        id,
        invoice_number,
        customer_id: cmd.customer_id.clone(),
        rep_id: cmd.rep_id.clone(),
        user_id: cmd.actor.user_id.clone(),
        subtotal_paise: totals.subtotal.paise(),
        gst_paise: totals.total_gst.paise(),
        discount_paise: totals.discount.paise(),
        net_paise: totals.net_amount.paise(),
        is_cash: cmd.is_cash,
        delivery_status: DeliveryStatus::Pending,
        delivery_otp: otp.to_string(),
        delivery_photo_url: None,
        delivery_signature: None,
        delivery_latitude: None,
        delivery_longitude: None,
        delivery_note: None,
        business_date,
        created_at,
        delivered_at: None,
    }
}
