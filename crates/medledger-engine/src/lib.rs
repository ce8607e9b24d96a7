//! # medledger-engine: Transaction Engine
//!
//! The only writer of stock, balances and documents. Request handlers build
//! a command, call one [`TransactionEngine`] operation, and get back either
//! the committed document or a typed [`LedgerError`].
//!
//! ## Operations
//! ```text
//! ┌──────────────────────────┬──────────────┬──────────────────────────────┐
//! │ Operation                │ Number       │ Effects                      │
//! ├──────────────────────────┼──────────────┼──────────────────────────────┤
//! │ create_sale              │ INV-YYYYMM-n │ stock −, customer + (credit) │
//! │ record_purchase          │ BILL-…       │ new batches, supplier +      │
//! │ create_sales_return      │ CN-…         │ stock +, customer −          │
//! │ create_purchase_return   │ DN-…         │ stock −, supplier −          │
//! │ verify_delivery          │              │ Pending → Delivered          │
//! └──────────────────────────┴──────────────┴──────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,ignore
//! let config = LedgerConfig::load(None)?;
//! let db = Database::new(config.database.to_db_config()).await?;
//! let engine = TransactionEngine::new(db, &config);
//!
//! let posted = engine.create_sale(CreateInvoice {
//!     customer_id,
//!     rep_id: None,
//!     actor,
//!     lines: vec![SaleLine::new(product_id, 3)],
//!     is_cash: false,
//!     discount: Money::zero(),
//! }).await?;
//! ```

pub mod clock;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod notify;
pub mod outbox;
pub mod telemetry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use commands::{
    CreateInvoice, CreatePurchaseReturn, CreateSalesReturn, PostedInvoice, PostedPurchase,
    PostedPurchaseReturn, PostedSalesReturn, PurchaseLine, RecordPurchase, ReturnLine, SaleLine,
    VerifyDelivery,
};
pub use config::LedgerConfig;
pub use engine::TransactionEngine;
pub use error::{LedgerError, LedgerResult};
pub use events::{DocumentSummary, EventBus, InvoiceSummary, LedgerEvent};
pub use notify::{LoggingNotifier, Notification, Notifier, NotifyError};
pub use outbox::{DispatchReport, OutboxProcessor, OutboxProcessorHandle};
