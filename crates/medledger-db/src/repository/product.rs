//! # Product Repository
//!
//! Database operations for the product master.
//!
//! ## Mutability Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Field                  No batches yet       Referenced by a batch      │
//! │  ─────────────────────  ───────────────────  ────────────────────────   │
//! │  name, manufacturer     editable             editable                   │
//! │  hsn_code, default GST  editable             frozen → ProductInUse      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products are never deleted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medledger_core::{CoreError, GstRate, Product};

const PRODUCT_COLUMNS: &str = r#"
    id, name, manufacturer, hsn_code, default_gst_rate_bps, created_at, updated_at
"#;

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub manufacturer: Option<String>,
    pub hsn_code: String,
    pub default_gst_rate: GstRate,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product with a generated id.
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            manufacturer: new.manufacturer,
            hsn_code: new.hsn_code.trim().to_string(),
            default_gst_rate_bps: new.default_gst_rate.bps(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, manufacturer, hsn_code, default_gst_rate_bps, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.manufacturer)
        .bind(&product.hsn_code)
        .bind(product.default_gst_rate_bps)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Gets a product by ID on an existing connection or transaction.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(product)
    }

    /// Updates the descriptive fields (name, manufacturer).
    ///
    /// Always allowed; posted documents keep their own name snapshot.
    pub async fn update_descriptive(
        &self,
        id: &str,
        name: &str,
        manufacturer: Option<&str>,
    ) -> DbResult<Product> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                manufacturer = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(name.trim())
        .bind(manufacturer)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Changes HSN code and default GST rate.
    ///
    /// ## Errors
    /// `Domain(ProductInUse)` once any batch references the product. The
    /// check and the update are a single statement.
    pub async fn update_tax_classification(
        &self,
        id: &str,
        hsn_code: &str,
        default_gst_rate: GstRate,
    ) -> DbResult<Product> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                hsn_code = ?2,
                default_gst_rate_bps = ?3,
                updated_at = ?4
            WHERE id = ?1
              AND NOT EXISTS (SELECT 1 FROM batches WHERE product_id = ?1)
            "#,
        )
        .bind(id)
        .bind(hsn_code.trim())
        .bind(default_gst_rate.bps())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(id).await? {
                Some(_) => Err(CoreError::ProductInUse {
                    product_id: id.to_string(),
                }
                .into()),
                None => Err(DbError::not_found("Product", id)),
            };
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Counts products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
