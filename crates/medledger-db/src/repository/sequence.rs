//! # Document Numbering
//!
//! Gap-tolerant, collision-free document numbers backed by a counter row
//! per `(kind, period)`.
//!
//! ```text
//! INSERT INTO document_sequences (kind, period, last_value) VALUES (?, ?, 1)
//! ON CONFLICT (kind, period) DO UPDATE SET last_value = last_value + 1
//! RETURNING last_value
//! ```
//!
//! Allocation inside a document's transaction means a rolled-back document
//! also rolls back its number. Allocation through [`DocumentNumbering::next`]
//! commits immediately; a caller that then abandons the document leaves a
//! gap, never a duplicate.

use chrono::NaiveDate;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::DbResult;
use medledger_core::numbering::{format_document_number, period_key};
use medledger_core::DocumentKind;

/// Allocator for human-facing document numbers.
#[derive(Debug, Clone)]
pub struct DocumentNumbering {
    pool: SqlitePool,
}

impl DocumentNumbering {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentNumbering { pool }
    }

    /// Allocates the next number inside an open transaction.
    pub async fn allocate(
        tx: &mut Transaction<'_, Sqlite>,
        kind: DocumentKind,
        business_date: NaiveDate,
    ) -> DbResult<String> {
        Self::allocate_on(&mut **tx, kind, business_date).await
    }

    async fn allocate_on(
        conn: &mut SqliteConnection,
        kind: DocumentKind,
        business_date: NaiveDate,
    ) -> DbResult<String> {
        let period = period_key(business_date);

        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (kind, period, last_value)
            VALUES (?1, ?2, 1)
            ON CONFLICT (kind, period) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(kind.as_str())
        .bind(&period)
        .fetch_one(&mut *conn)
        .await?;

        let number = format_document_number(kind, &period, value);
        debug!(kind = %kind, number = %number, "Allocated document number");
        Ok(number)
    }

    /// Allocates and commits the next number on its own.
    pub async fn next(&self, kind: DocumentKind, business_date: NaiveDate) -> DbResult<String> {
        let mut tx = self.pool.begin().await?;
        let number = Self::allocate(&mut tx, kind, business_date).await?;
        tx.commit().await?;
        Ok(number)
    }

    pub async fn next_invoice_number(&self, business_date: NaiveDate) -> DbResult<String> {
        self.next(DocumentKind::Invoice, business_date).await
    }

    pub async fn next_bill_number(&self, business_date: NaiveDate) -> DbResult<String> {
        self.next(DocumentKind::PurchaseBill, business_date).await
    }

    pub async fn next_order_number(&self, business_date: NaiveDate) -> DbResult<String> {
        self.next(DocumentKind::Order, business_date).await
    }

    /// Last value handed out for a kind and period, 0 if none.
    pub async fn current(&self, kind: DocumentKind, business_date: NaiveDate) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT last_value FROM document_sequences WHERE kind = ?1 AND period = ?2",
        )
        .bind(kind.as_str())
        .bind(period_key(business_date))
        .fetch_optional(&self.pool)
        .await?;
        Ok(value.unwrap_or(0))
    }
}
