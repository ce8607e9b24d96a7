//! # medledger-db: Database Layer for MedLedger
//!
//! SQLite persistence for the inventory and accounts ledger, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedLedger Data Flow                              │
//! │                                                                         │
//! │  TransactionEngine::create_sale                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   medledger-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ BatchLedger   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ PartyRepo     │    │ 001_initial  │  │   │
//! │  │   │ begin() → tx  │    │ InvoiceRepo   │    │ _schema.sql  │  │   │
//! │  │   │               │    │ Numbering     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              SQLite (WAL, busy_timeout, foreign keys)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Ledgers, document repositories, numbering, outbox
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medledger_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/ledger.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let remaining = BatchLedger::reserve_stock(&mut tx, &batch_id, 5, StockMovementReason::Sale, &doc).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    BatchDetails, BatchLedger, DocumentNumbering, InvoiceRepository, NewParty, NewProduct,
    NotificationOutboxRepository, PartyRepository, ProductRepository, PurchaseRepository,
    ReturnRepository,
};
