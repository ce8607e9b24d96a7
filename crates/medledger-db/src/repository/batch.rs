//! # Batch Ledger
//!
//! Owns per-batch stock. Every stock change goes through this module and is
//! journaled in `stock_movements`.
//!
//! ## Compare-and-Swap Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two invoices race for batch B (stock 10), each wanting 8               │
//! │                                                                         │
//! │  Invoice A                          Invoice B                           │
//! │  UPDATE batches                     UPDATE batches                      │
//! │     SET current_stock = stock - 8      SET current_stock = stock - 8    │
//! │   WHERE id = B                       WHERE id = B                       │
//! │     AND current_stock >= 8             AND current_stock >= 8           │
//! │  → 1 row, stock 2                   (waits for A's write lock)          │
//! │  COMMIT                             → 0 rows → InsufficientStock        │
//! │                                                                         │
//! │  The check and the write are one statement; no read-then-write window.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `CHECK (current_stock >= 0)` on the table backs this up at the schema
//! level.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medledger_core::{Batch, CoreError, GstRate, Money, StockMovement, StockMovementReason};

/// Batch columns, with rowid exposed as receipt order.
const BATCH_COLUMNS: &str = r#"
    id, product_id, batch_number, expiry_date, purchase_price_paise, sale_price_paise,
    gst_rate_bps, current_stock, rowid AS receipt_seq, created_at
"#;

/// Lot details supplied on a purchase line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDetails {
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub purchase_price: Money,
    pub sale_price: Money,
    pub gst_rate: GstRate,
}

/// Batch stock ledger.
#[derive(Debug, Clone)]
pub struct BatchLedger {
    pool: SqlitePool,
}

impl BatchLedger {
    pub fn new(pool: SqlitePool) -> Self {
        BatchLedger { pool }
    }

    // =========================================================================
    // Mutations (transaction-scoped)
    // =========================================================================

    /// Creates a new batch holding `quantity` units.
    ///
    /// Every purchase line creates its own batch, even when the batch number
    /// repeats an earlier lot of the same product.
    pub async fn receive_stock(
        tx: &mut Transaction<'_, Sqlite>,
        product_id: &str,
        details: &BatchDetails,
        quantity: i64,
        document_id: &str,
    ) -> DbResult<Batch> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let receipt_seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO batches (
                id, product_id, batch_number, expiry_date,
                purchase_price_paise, sale_price_paise, gst_rate_bps,
                current_stock, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING rowid
            "#,
        )
        .bind(&id)
        .bind(product_id)
        .bind(details.batch_number.trim())
        .bind(details.expiry_date)
        .bind(details.purchase_price.paise())
        .bind(details.sale_price.paise())
        .bind(details.gst_rate.bps())
        .bind(quantity)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        Self::journal(tx, &id, quantity, StockMovementReason::Purchase, document_id).await?;

        debug!(
            batch_id = %id,
            batch_number = %details.batch_number,
            quantity,
            "Stock received"
        );

        Ok(Batch {
            id,
            product_id: product_id.to_string(),
            batch_number: details.batch_number.trim().to_string(),
            expiry_date: details.expiry_date,
            purchase_price_paise: details.purchase_price.paise(),
            sale_price_paise: details.sale_price.paise(),
            gst_rate_bps: details.gst_rate.bps(),
            current_stock: quantity,
            receipt_seq,
            created_at: now,
        })
    }

    /// Removes `quantity` units from a batch if, and only if, it holds them.
    ///
    /// ## Errors
    /// - `Domain(BatchNotFound)` if the batch doesn't exist
    /// - `Domain(InsufficientStock)` for a sale,
    ///   `Domain(InsufficientStockForReturn)` for a purchase return
    ///
    /// ## Returns
    /// The remaining stock.
    pub async fn reserve_stock(
        tx: &mut Transaction<'_, Sqlite>,
        batch_id: &str,
        quantity: i64,
        reason: StockMovementReason,
        document_id: &str,
    ) -> DbResult<i64> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE batches SET current_stock = current_stock - ?2
            WHERE id = ?1 AND current_stock >= ?2
            RETURNING current_stock
            "#,
        )
        .bind(batch_id)
        .bind(quantity)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(remaining) = remaining else {
            return Err(Self::shortfall(tx, batch_id, quantity, reason).await);
        };

        Self::journal(tx, batch_id, -quantity, reason, document_id).await?;

        debug!(batch_id = %batch_id, quantity, remaining, "Stock reserved");
        Ok(remaining)
    }

    /// Puts `quantity` units back into a batch (sales return).
    ///
    /// ## Returns
    /// The new stock.
    pub async fn release_stock(
        tx: &mut Transaction<'_, Sqlite>,
        batch_id: &str,
        quantity: i64,
        reason: StockMovementReason,
        document_id: &str,
    ) -> DbResult<i64> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE batches SET current_stock = current_stock + ?2
            WHERE id = ?1
            RETURNING current_stock
            "#,
        )
        .bind(batch_id)
        .bind(quantity)
        .fetch_optional(&mut **tx)
        .await?;

        let stock =
            stock.ok_or_else(|| DbError::from(CoreError::BatchNotFound(batch_id.to_string())))?;

        Self::journal(tx, batch_id, quantity, reason, document_id).await?;

        debug!(batch_id = %batch_id, quantity, stock, "Stock released");
        Ok(stock)
    }

    async fn journal(
        tx: &mut Transaction<'_, Sqlite>,
        batch_id: &str,
        delta: i64,
        reason: StockMovementReason,
        document_id: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, batch_id, delta, reason, document_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(batch_id)
        .bind(delta)
        .bind(reason)
        .bind(document_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Builds the business error for a failed decrement.
    async fn shortfall(
        tx: &mut Transaction<'_, Sqlite>,
        batch_id: &str,
        requested: i64,
        reason: StockMovementReason,
    ) -> DbError {
        let row: Result<Option<(String, String, i64)>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT p.name, b.batch_number, b.current_stock
            FROM batches b JOIN products p ON p.id = b.product_id
            WHERE b.id = ?1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&mut **tx)
        .await;

        let (product, batch_number, available) = match row {
            Ok(Some(row)) => row,
            Ok(None) => return CoreError::BatchNotFound(batch_id.to_string()).into(),
            Err(e) => return e.into(),
        };

        warn!(
            batch_id = %batch_id,
            product = %product,
            requested,
            available,
            "Stock decrement rejected"
        );

        let err = match reason {
            StockMovementReason::PurchaseReturn => CoreError::InsufficientStockForReturn {
                product,
                batch_number,
                requested,
                available,
            },
            _ => CoreError::InsufficientStock {
                product,
                requested,
                available,
            },
        };
        err.into()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Batch>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Batch>> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = ?1");
        let batch = sqlx::query_as::<_, Batch>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(batch)
    }

    /// Batches of a product still sellable on `as_of` (expiry after it),
    /// in FEFO order. Stock may be zero.
    pub async fn list_sellable(
        conn: &mut SqliteConnection,
        product_id: &str,
        as_of: NaiveDate,
    ) -> DbResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batches
             WHERE product_id = ?1 AND expiry_date > ?2
             ORDER BY expiry_date, rowid"
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(product_id)
            .bind(as_of)
            .fetch_all(&mut *conn)
            .await?;
        Ok(batches)
    }

    /// All batches of a product, including expired and empty ones.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE product_id = ?1 ORDER BY expiry_date, rowid"
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(batches)
    }

    /// Stock journal of a batch, oldest first.
    pub async fn movements(&self, batch_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, batch_id, delta, reason, document_id, created_at
            FROM stock_movements
            WHERE batch_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Checks that `current_stock` equals the sum of the batch's movements.
    pub async fn reconcile(&self, batch_id: &str) -> DbResult<bool> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT b.current_stock,
                   COALESCE((SELECT SUM(delta) FROM stock_movements m
                             WHERE m.batch_id = b.id), 0)
            FROM batches b
            WHERE b.id = ?1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        let (stock, journal) = row.ok_or_else(|| DbError::not_found("Batch", batch_id))?;
        Ok(stock == journal)
    }
}
