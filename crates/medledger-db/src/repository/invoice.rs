//! # Invoice Repository
//!
//! Persistence for sale invoices and their lines.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. INSERT (inside the sale unit of work, after stock and balance)     │
//! │     └── invoices + invoice_items, delivery_status = 'pending'          │
//! │                                                                         │
//! │  2. DELIVER (separate, no stock/balance effect)                        │
//! │     └── UPDATE … SET delivery_status = 'delivered'                     │
//! │         WHERE delivery_status = 'pending'          (exactly once)      │
//! │                                                                         │
//! │  3. RETURN (inside a sales-return unit of work)                        │
//! │     └── returned_quantity += q WHERE returned_quantity + q <= quantity │
//! │     └── all lines fully returned → delivery_status = 'returned'        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Header amounts and line snapshots are never updated after insert.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::DbResult;
use medledger_core::{CoreError, DeliveryProof, Invoice, InvoiceItem};

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, customer_id, rep_id, user_id,
    subtotal_paise, gst_paise, discount_paise, net_paise, is_cash,
    delivery_status, delivery_otp,
    delivery_photo_url, delivery_signature, delivery_latitude, delivery_longitude, delivery_note,
    business_date, created_at, delivered_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, invoice_id, line_no, product_id, batch_id, product_name, batch_number, expiry_date,
    quantity, unit_price_paise, gst_rate_bps, line_subtotal_paise, gst_paise, line_total_paise,
    returned_quantity
"#;

/// Repository for sale invoices.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Inserts an invoice header and its lines.
    pub async fn insert(
        tx: &mut Transaction<'_, Sqlite>,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> DbResult<()> {
        debug!(
            id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            lines = items.len(),
            "Inserting invoice"
        );

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, customer_id, rep_id, user_id,
                subtotal_paise, gst_paise, discount_paise, net_paise, is_cash,
                delivery_status, delivery_otp,
                delivery_photo_url, delivery_signature, delivery_latitude,
                delivery_longitude, delivery_note,
                business_date, created_at, delivered_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17,
                ?18, ?19, ?20
            )
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.customer_id)
        .bind(&invoice.rep_id)
        .bind(&invoice.user_id)
        .bind(invoice.subtotal_paise)
        .bind(invoice.gst_paise)
        .bind(invoice.discount_paise)
        .bind(invoice.net_paise)
        .bind(invoice.is_cash)
        .bind(invoice.delivery_status)
        .bind(&invoice.delivery_otp)
        .bind(&invoice.delivery_photo_url)
        .bind(&invoice.delivery_signature)
        .bind(invoice.delivery_latitude)
        .bind(invoice.delivery_longitude)
        .bind(&invoice.delivery_note)
        .bind(invoice.business_date)
        .bind(invoice.created_at)
        .bind(invoice.delivered_at)
        .execute(&mut **tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, line_no, product_id, batch_id,
                    product_name, batch_number, expiry_date,
                    quantity, unit_price_paise, gst_rate_bps,
                    line_subtotal_paise, gst_paise, line_total_paise, returned_quantity
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5,
                    ?6, ?7, ?8,
                    ?9, ?10, ?11,
                    ?12, ?13, ?14, ?15
                )
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(item.line_no)
            .bind(&item.product_id)
            .bind(&item.batch_id)
            .bind(&item.product_name)
            .bind(&item.batch_number)
            .bind(item.expiry_date)
            .bind(item.quantity)
            .bind(item.unit_price_paise)
            .bind(item.gst_rate_bps)
            .bind(item.line_subtotal_paise)
            .bind(item.gst_paise)
            .bind(item.line_total_paise)
            .bind(item.returned_quantity)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(invoice)
    }

    pub async fn get_by_number(&self, invoice_number: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_number = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    /// Gets all lines of an invoice in line order.
    pub async fn get_items(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, invoice_id).await
    }

    pub async fn items(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = ?1 ORDER BY line_no");
        let items = sqlx::query_as::<_, InvoiceItem>(&sql)
            .bind(invoice_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(items)
    }

    /// Adds `quantity` to a line's returned quantity, bounded by what was sold.
    ///
    /// ## Errors
    /// `Domain(ReturnQuantityExceedsOriginal)` when the bound would be crossed;
    /// the check and the write are one statement.
    pub async fn record_return(
        tx: &mut Transaction<'_, Sqlite>,
        item: &InvoiceItem,
        quantity: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoice_items SET returned_quantity = returned_quantity + ?2
            WHERE id = ?1 AND returned_quantity + ?2 <= quantity
            "#,
        )
        .bind(&item.id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let returned: i64 =
                sqlx::query_scalar("SELECT returned_quantity FROM invoice_items WHERE id = ?1")
                    .bind(&item.id)
                    .fetch_one(&mut **tx)
                    .await?;
            return Err(CoreError::ReturnQuantityExceedsOriginal {
                product: item.product_name.clone(),
                item_id: item.id.clone(),
                requested: quantity,
                returnable: item.quantity - returned,
            }
            .into());
        }

        Ok(())
    }

    /// Marks the invoice RETURNED once every line is fully returned.
    ///
    /// ## Returns
    /// `true` if the status changed.
    pub async fn mark_returned_if_complete(
        tx: &mut Transaction<'_, Sqlite>,
        invoice_id: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET delivery_status = 'returned'
            WHERE id = ?1
              AND delivery_status <> 'returned'
              AND NOT EXISTS (
                  SELECT 1 FROM invoice_items
                  WHERE invoice_id = ?1 AND returned_quantity < quantity
              )
            "#,
        )
        .bind(invoice_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Moves a PENDING invoice to DELIVERED with the captured proof.
    ///
    /// ## Returns
    /// `false` if the invoice was no longer PENDING; the caller decides
    /// whether that means already delivered or returned.
    pub async fn mark_delivered(
        &self,
        invoice_id: &str,
        proof: &DeliveryProof,
        delivered_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                delivery_status = 'delivered',
                delivery_photo_url = ?2,
                delivery_signature = ?3,
                delivery_latitude = ?4,
                delivery_longitude = ?5,
                delivery_note = ?6,
                delivered_at = ?7
            WHERE id = ?1 AND delivery_status = 'pending'
            "#,
        )
        .bind(invoice_id)
        .bind(&proof.photo_url)
        .bind(&proof.signature)
        .bind(proof.latitude)
        .bind(proof.longitude)
        .bind(&proof.note)
        .bind(delivered_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Counts invoices.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Checks that an invoice exists, for callers that only hold an id.
    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM invoices WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}
