//! # Repository Module
//!
//! Database repository implementations for MedLedger.
//!
//! ## Two Calling Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool-backed reads (outside any unit of work)                           │
//! │       db.invoices().get_by_id("…").await?                               │
//! │                                                                         │
//! │  Transaction-scoped ledger operations (inside the engine only)          │
//! │       let mut tx = db.begin().await?;                                   │
//! │       BatchLedger::reserve_stock(&mut tx, …).await?;                    │
//! │       PartyRepository::adjust_balance(&mut tx, …).await?;               │
//! │       InvoiceRepository::insert(&mut tx, …).await?;                     │
//! │       tx.commit().await?;                                               │
//! │                                                                         │
//! │  Mutators take `&mut Transaction` so they cannot run outside one.       │
//! │  In-transaction reads take `&mut SqliteConnection` (`&mut *tx`).        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product master and the tax-classification guard
//! - [`PartyRepository`] - Local party projection and the balance ledger
//! - [`BatchLedger`] - Batch stock with compare-and-swap decrements
//! - [`InvoiceRepository`] / [`PurchaseRepository`] - Documents and lines
//! - [`ReturnRepository`] - Credit and debit notes
//! - [`DocumentNumbering`] - Per-period document counters
//! - [`NotificationOutboxRepository`] - Post-commit notification queue

pub mod batch;
pub mod invoice;
pub mod outbox;
pub mod party;
pub mod product;
pub mod purchase;
pub mod returns;
pub mod sequence;

pub use batch::{BatchDetails, BatchLedger};
pub use invoice::InvoiceRepository;
pub use outbox::NotificationOutboxRepository;
pub use party::{NewParty, PartyRepository};
pub use product::{NewProduct, ProductRepository};
pub use purchase::PurchaseRepository;
pub use returns::ReturnRepository;
pub use sequence::DocumentNumbering;

/// Fixtures shared by repository tests.
#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use medledger_core::{GstRate, Money, Party, PartyKind, Product};

    use super::*;
    use crate::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub async fn product(db: &Database, name: &str) -> Product {
        db.products()
            .insert(NewProduct {
                name: name.to_string(),
                manufacturer: Some("Sun Remedies".to_string()),
                hsn_code: "3004".to_string(),
                default_gst_rate: GstRate::from_percent(12),
            })
            .await
            .unwrap()
    }

    pub async fn party(db: &Database, kind: PartyKind, name: &str) -> Party {
        db.parties()
            .insert(NewParty {
                kind,
                name: name.to_string(),
                tax_id: None,
                phone: Some("+919800000000".to_string()),
                email: None,
            })
            .await
            .unwrap()
    }

    pub fn details(batch_number: &str, expiry: NaiveDate) -> BatchDetails {
        BatchDetails {
            batch_number: batch_number.to_string(),
            expiry_date: expiry,
            purchase_price: Money::from_paise(7_000),
            sale_price: Money::from_paise(10_000),
            gst_rate: GstRate::from_percent(12),
        }
    }

    /// Receives `quantity` of a fresh batch in its own committed transaction.
    pub async fn stocked_batch(
        db: &Database,
        product: &Product,
        batch_number: &str,
        expiry: NaiveDate,
        quantity: i64,
    ) -> medledger_core::Batch {
        let mut tx = db.begin().await.unwrap();
        let batch = BatchLedger::receive_stock(
            &mut tx,
            &product.id,
            &details(batch_number, expiry),
            quantity,
            "seed-doc",
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        batch
    }
}
