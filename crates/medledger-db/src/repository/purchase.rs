//! # Purchase Repository
//!
//! Purchase bills and their lines. Every purchase line owns the batch it
//! created; the batch id is recorded on the line so a later debit note
//! knows which stock to take back.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::DbResult;
use medledger_core::{CoreError, Purchase, PurchaseItem};

const PURCHASE_COLUMNS: &str = r#"
    id, bill_number, supplier_id, supplier_reference,
    subtotal_paise, gst_paise, total_paise, business_date, created_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, purchase_id, line_no, product_id, batch_id, product_name, batch_number, expiry_date,
    quantity, purchase_price_paise, sale_price_paise, gst_rate_bps,
    line_subtotal_paise, gst_paise, line_total_paise, returned_quantity
"#;

/// Repository for purchase bills.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Inserts a purchase header and its lines. Batches must already exist.
    pub async fn insert(
        tx: &mut Transaction<'_, Sqlite>,
        purchase: &Purchase,
        items: &[PurchaseItem],
    ) -> DbResult<()> {
        debug!(
            id = %purchase.id,
            bill_number = %purchase.bill_number,
            lines = items.len(),
            "Inserting purchase"
        );

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, bill_number, supplier_id, supplier_reference,
                subtotal_paise, gst_paise, total_paise, business_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.bill_number)
        .bind(&purchase.supplier_id)
        .bind(&purchase.supplier_reference)
        .bind(purchase.subtotal_paise)
        .bind(purchase.gst_paise)
        .bind(purchase.total_paise)
        .bind(purchase.business_date)
        .bind(purchase.created_at)
        .execute(&mut **tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (
                    id, purchase_id, line_no, product_id, batch_id,
                    product_name, batch_number, expiry_date,
                    quantity, purchase_price_paise, sale_price_paise, gst_rate_bps,
                    line_subtotal_paise, gst_paise, line_total_paise, returned_quantity
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5,
                    ?6, ?7, ?8,
                    ?9, ?10, ?11, ?12,
                    ?13, ?14, ?15, ?16
                )
                "#,
            )
            .bind(&item.id)
            .bind(&item.purchase_id)
            .bind(item.line_no)
            .bind(&item.product_id)
            .bind(&item.batch_id)
            .bind(&item.product_name)
            .bind(&item.batch_number)
            .bind(item.expiry_date)
            .bind(item.quantity)
            .bind(item.purchase_price_paise)
            .bind(item.sale_price_paise)
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

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Purchase>> {
        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1");
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(purchase)
    }

    pub async fn get_items(&self, purchase_id: &str) -> DbResult<Vec<PurchaseItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, purchase_id).await
    }

    pub async fn items(
        conn: &mut SqliteConnection,
        purchase_id: &str,
    ) -> DbResult<Vec<PurchaseItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_items WHERE purchase_id = ?1 ORDER BY line_no"
        );
        let items = sqlx::query_as::<_, PurchaseItem>(&sql)
            .bind(purchase_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(items)
    }

    /// Adds `quantity` to a line's returned quantity, bounded by what was
    /// received.
    pub async fn record_return(
        tx: &mut Transaction<'_, Sqlite>,
        item: &PurchaseItem,
        quantity: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_items SET returned_quantity = returned_quantity + ?2
            WHERE id = ?1 AND returned_quantity + ?2 <= quantity
            "#,
        )
        .bind(&item.id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let returned: i64 =
                sqlx::query_scalar("SELECT returned_quantity FROM purchase_items WHERE id = ?1")
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

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{date, db, party, product, stocked_batch};
    use chrono::Utc;
    use medledger_core::PartyKind;

    #[tokio::test]
    async fn test_insert_load_and_bounded_return() {
        let db = db().await;
        let supplier = party(&db, PartyKind::Supplier, "Ganga Distributors").await;
        let p = product(&db, "Azithromycin 250mg").await;
        let batch = stocked_batch(&db, &p, "AZ-77", date(2029, 8, 31), 50).await;

        let purchase = Purchase {
            id: "pur-1".to_string(),
            bill_number: "BILL-202501-000001".to_string(),
            supplier_id: supplier.id.clone(),
            supplier_reference: Some("GD/4471".to_string()),
            subtotal_paise: 350_000,
            gst_paise: 42_000,
            total_paise: 392_000,
            business_date: date(2025, 1, 5),
            created_at: Utc::now(),
        };
        let item = PurchaseItem {
            id: "pi-1".to_string(),
            purchase_id: purchase.id.clone(),
            line_no: 1,
            product_id: p.id.clone(),
            batch_id: batch.id.clone(),
            product_name: p.name.clone(),
            batch_number: batch.batch_number.clone(),
            expiry_date: batch.expiry_date,
            quantity: 50,
            purchase_price_paise: 7_000,
            sale_price_paise: 10_000,
            gst_rate_bps: 1200,
            line_subtotal_paise: 350_000,
            gst_paise: 42_000,
            line_total_paise: 392_000,
            returned_quantity: 0,
        };

        let mut tx = db.begin().await.unwrap();
        PurchaseRepository::insert(&mut tx, &purchase, std::slice::from_ref(&item))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let loaded = db.purchases().get_by_id("pur-1").await.unwrap().unwrap();
        assert_eq!(loaded.supplier_reference.as_deref(), Some("GD/4471"));
        assert_eq!(loaded.total_amount().paise(), 392_000);
        assert_eq!(db.purchases().count().await.unwrap(), 1);

        let mut tx = db.begin().await.unwrap();
        PurchaseRepository::record_return(&mut tx, &item, 45).await.unwrap();
        let err = PurchaseRepository::record_return(&mut tx, &item, 6)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ReturnQuantityExceedsOriginal { returnable: 5, .. })
        ));
        tx.commit().await.unwrap();

        let items = db.purchases().get_items("pur-1").await.unwrap();
        assert_eq!(items[0].returned_quantity, 45);
        assert_eq!(items[0].returnable(), 5);
    }
}
