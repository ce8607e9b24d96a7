//! Common fixtures for engine integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use medledger_core::{Actor, Batch, GstRate, Money, Party, PartyKind, Product, Role};
use medledger_db::{Database, DbConfig, NewParty, NewProduct};
use medledger_engine::{
    CreateInvoice, FixedClock, LedgerConfig, LedgerError, PostedPurchase, PurchaseLine,
    RecordPurchase, SaleLine, TransactionEngine,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Business date every fixture runs on unless a test says otherwise.
pub fn today() -> NaiveDate {
    date(2026, 10, 17)
}

/// Config with a short first backoff and a long retry budget.
pub fn test_config() -> LedgerConfig {
    let mut config = LedgerConfig::default();
    config.engine.retry_initial_backoff_ms = 5;
    config.engine.retry_max_elapsed_ms = 15_000;
    config
}

pub fn admin() -> Actor {
    Actor::new("usr-admin", Role::Admin, true)
}

/// An engine on a fresh database with one customer and one supplier.
pub struct Ledger {
    pub engine: TransactionEngine,
    pub db: Database,
    pub customer: Party,
    pub supplier: Party,
}

impl Ledger {
    pub async fn in_memory() -> Self {
        Self::in_memory_with(test_config()).await
    }

    pub async fn in_memory_with(config: LedgerConfig) -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Self::with_db(db, config).await
    }

    /// File-backed database with a real connection pool.
    pub async fn on_disk(dir: &Path, max_connections: u32) -> Self {
        let db = Database::new(
            DbConfig::new(dir.join("ledger.db")).max_connections(max_connections),
        )
        .await
        .unwrap();
        Self::with_db(db, test_config()).await
    }

    /// File-backed database opened exactly as `config` describes.
    pub async fn on_disk_with(dir: &Path, mut config: LedgerConfig) -> Self {
        config.database.path = dir.join("ledger.db");
        let db = Database::new(config.database.to_db_config()).await.unwrap();
        Self::with_db(db, config).await
    }

    pub async fn with_db(db: Database, config: LedgerConfig) -> Self {
        let engine = TransactionEngine::new(db.clone(), &config)
            .with_clock(Arc::new(FixedClock::on(today())));

        let customer = db
            .parties()
            .insert(NewParty {
                kind: PartyKind::Customer,
                name: "City Chemists".to_string(),
                tax_id: Some("27AAACC1234F1Z5".to_string()),
                phone: Some("+919800000101".to_string()),
                email: None,
            })
            .await
            .unwrap();

        let supplier = db
            .parties()
            .insert(NewParty {
                kind: PartyKind::Supplier,
                name: "Sun Distributors".to_string(),
                tax_id: None,
                phone: None,
                email: None,
            })
            .await
            .unwrap();

        Ledger {
            engine,
            db,
            customer,
            supplier,
        }
    }

    /// The same engine, running on another business date.
    pub fn on(&self, day: NaiveDate) -> TransactionEngine {
        self.engine.clone().with_clock(Arc::new(FixedClock::on(day)))
    }

    pub async fn product(&self, name: &str, gst_percent: u32) -> Product {
        self.db
            .products()
            .insert(NewProduct {
                name: name.to_string(),
                manufacturer: Some("Sun Remedies".to_string()),
                hsn_code: "3004".to_string(),
                default_gst_rate: GstRate::from_percent(gst_percent),
            })
            .await
            .unwrap()
    }

    pub fn lot(
        product: &Product,
        batch_number: &str,
        expiry: NaiveDate,
        quantity: i64,
        sale_price: Money,
    ) -> PurchaseLine {
        PurchaseLine {
            product_id: product.id.clone(),
            batch_number: batch_number.to_string(),
            expiry_date: expiry,
            quantity,
            purchase_price: Money::from_paise(sale_price.paise() * 7 / 10),
            sale_price,
            gst_rate: None,
        }
    }

    /// Receives one lot from the supplier on today's date.
    pub async fn receive(
        &self,
        product: &Product,
        batch_number: &str,
        expiry: NaiveDate,
        quantity: i64,
        sale_price: Money,
    ) -> (PostedPurchase, Batch) {
        self.receive_with(&self.engine, product, batch_number, expiry, quantity, sale_price)
            .await
    }

    pub async fn receive_with(
        &self,
        engine: &TransactionEngine,
        product: &Product,
        batch_number: &str,
        expiry: NaiveDate,
        quantity: i64,
        sale_price: Money,
    ) -> (PostedPurchase, Batch) {
        let posted = engine
            .record_purchase(RecordPurchase {
                supplier_id: self.supplier.id.clone(),
                supplier_reference: None,
                lines: vec![Self::lot(product, batch_number, expiry, quantity, sale_price)],
            })
            .await
            .unwrap();
        let batch = self.batch(&posted.items[0].batch_id).await;
        (posted, batch)
    }

    /// Credit invoice for the fixture customer, issued by an admin.
    pub fn invoice(&self, lines: Vec<SaleLine>) -> CreateInvoice {
        CreateInvoice {
            customer_id: self.customer.id.clone(),
            rep_id: None,
            actor: admin(),
            lines,
            is_cash: false,
            discount: Money::zero(),
        }
    }

    pub async fn batch(&self, batch_id: &str) -> Batch {
        self.db.batches().get_by_id(batch_id).await.unwrap().unwrap()
    }

    pub async fn stock(&self, batch_id: &str) -> i64 {
        self.batch(batch_id).await.current_stock
    }

    pub async fn balance(&self, party_id: &str) -> Money {
        self.db
            .parties()
            .get_by_id(party_id)
            .await
            .unwrap()
            .unwrap()
            .balance()
    }
}

/// Unwraps the business error of a failed operation.
pub fn core_err<T: std::fmt::Debug>(result: Result<T, LedgerError>) -> medledger_core::CoreError {
    match result {
        Err(LedgerError::Core(e)) => e,
        other => panic!("expected a business error, got {other:?}"),
    }
}
