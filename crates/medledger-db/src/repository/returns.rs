//! # Return Repository
//!
//! Credit notes (sales returns) and debit notes (purchase returns).
//! Both are append-only; the stock and balance effects are applied by the
//! engine in the same unit of work.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::DbResult;
use medledger_core::{Money, PurchaseReturn, PurchaseReturnItem, SalesReturn, SalesReturnItem};

/// Repository for credit and debit notes.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    // =========================================================================
    // Sales Returns
    // =========================================================================

    pub async fn insert_sales_return(
        tx: &mut Transaction<'_, Sqlite>,
        header: &SalesReturn,
        items: &[SalesReturnItem],
    ) -> DbResult<()> {
        debug!(id = %header.id, number = %header.return_number, "Inserting credit note");

        sqlx::query(
            r#"
            INSERT INTO sales_returns (
                id, return_number, invoice_id, customer_id,
                subtotal_paise, gst_paise, discount_paise, total_paise, business_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&header.id)
        .bind(&header.return_number)
        .bind(&header.invoice_id)
        .bind(&header.customer_id)
        .bind(header.subtotal_paise)
        .bind(header.gst_paise)
        .bind(header.discount_paise)
        .bind(header.total_paise)
        .bind(header.business_date)
        .bind(header.created_at)
        .execute(&mut **tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sales_return_items (
                    id, return_id, invoice_item_id, product_id, batch_id, quantity, reason,
                    unit_price_paise, gst_rate_bps, line_subtotal_paise, gst_paise, line_total_paise
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&item.id)
            .bind(&item.return_id)
            .bind(&item.invoice_item_id)
            .bind(&item.product_id)
            .bind(&item.batch_id)
            .bind(item.quantity)
            .bind(&item.reason)
            .bind(item.unit_price_paise)
            .bind(item.gst_rate_bps)
            .bind(item.line_subtotal_paise)
            .bind(item.gst_paise)
            .bind(item.line_total_paise)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    pub async fn get_sales_return(&self, id: &str) -> DbResult<Option<SalesReturn>> {
        let header = sqlx::query_as::<_, SalesReturn>(
            r#"
            SELECT id, return_number, invoice_id, customer_id,
                   subtotal_paise, gst_paise, discount_paise, total_paise, business_date, created_at
            FROM sales_returns WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(header)
    }

    pub async fn sales_return_items(&self, return_id: &str) -> DbResult<Vec<SalesReturnItem>> {
        let items = sqlx::query_as::<_, SalesReturnItem>(
            r#"
            SELECT id, return_id, invoice_item_id, product_id, batch_id, quantity, reason,
                   unit_price_paise, gst_rate_bps, line_subtotal_paise, gst_paise, line_total_paise
            FROM sales_return_items WHERE return_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(return_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Credit notes issued against an invoice, oldest first.
    pub async fn sales_returns_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<SalesReturn>> {
        let headers = sqlx::query_as::<_, SalesReturn>(
            r#"
            SELECT id, return_number, invoice_id, customer_id,
                   subtotal_paise, gst_paise, discount_paise, total_paise, business_date, created_at
            FROM sales_returns WHERE invoice_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(headers)
    }

    /// Total credited and discount given back so far against an invoice.
    pub async fn credited_against_invoice(
        conn: &mut SqliteConnection,
        invoice_id: &str,
    ) -> DbResult<(Money, Money)> {
        let (total, discount): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_paise), 0), COALESCE(SUM(discount_paise), 0)
            FROM sales_returns WHERE invoice_id = ?1
            "#,
        )
        .bind(invoice_id)
        .fetch_one(conn)
        .await?;
        Ok((Money::from_paise(total), Money::from_paise(discount)))
    }

    // =========================================================================
    // Purchase Returns
    // =========================================================================

    pub async fn insert_purchase_return(
        tx: &mut Transaction<'_, Sqlite>,
        header: &PurchaseReturn,
        items: &[PurchaseReturnItem],
    ) -> DbResult<()> {
        debug!(id = %header.id, number = %header.return_number, "Inserting debit note");

        sqlx::query(
            r#"
            INSERT INTO purchase_returns (
                id, return_number, purchase_id, supplier_id,
                subtotal_paise, gst_paise, total_paise, business_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&header.id)
        .bind(&header.return_number)
        .bind(&header.purchase_id)
        .bind(&header.supplier_id)
        .bind(header.subtotal_paise)
        .bind(header.gst_paise)
        .bind(header.total_paise)
        .bind(header.business_date)
        .bind(header.created_at)
        .execute(&mut **tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO purchase_return_items (
                    id, return_id, purchase_item_id, product_id, batch_id, quantity, reason,
                    purchase_price_paise, gst_rate_bps, line_subtotal_paise, gst_paise,
                    line_total_paise
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&item.id)
            .bind(&item.return_id)
            .bind(&item.purchase_item_id)
            .bind(&item.product_id)
            .bind(&item.batch_id)
            .bind(item.quantity)
            .bind(&item.reason)
            .bind(item.purchase_price_paise)
            .bind(item.gst_rate_bps)
            .bind(item.line_subtotal_paise)
            .bind(item.gst_paise)
            .bind(item.line_total_paise)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    pub async fn get_purchase_return(&self, id: &str) -> DbResult<Option<PurchaseReturn>> {
        let header = sqlx::query_as::<_, PurchaseReturn>(
            r#"
            SELECT id, return_number, purchase_id, supplier_id,
                   subtotal_paise, gst_paise, total_paise, business_date, created_at
            FROM purchase_returns WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(header)
    }

    pub async fn purchase_return_items(
        &self,
        return_id: &str,
    ) -> DbResult<Vec<PurchaseReturnItem>> {
        let items = sqlx::query_as::<_, PurchaseReturnItem>(
            r#"
            SELECT id, return_id, purchase_item_id, product_id, batch_id, quantity, reason,
                   purchase_price_paise, gst_rate_bps, line_subtotal_paise, gst_paise,
                   line_total_paise
            FROM purchase_return_items WHERE return_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(return_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Counts credit notes and debit notes.
    pub async fn counts(&self) -> DbResult<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM sales_returns),
                   (SELECT COUNT(*) FROM purchase_returns)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}
