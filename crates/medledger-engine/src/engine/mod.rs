//! # Transaction Engine
//!
//! Runs every stock- and balance-affecting operation as one atomic unit of
//! work.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One Unit of Work                                  │
//! │                                                                         │
//! │  validate + authorize (no I/O)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ─────────────────────────────────────────────────────────────┐  │
//! │  │ resolve references (party, products, batches, original lines)   │  │
//! │  │ stock CAS per line          (BatchLedger)                        │  │
//! │  │ return bound CAS per line   (Invoice/PurchaseRepository)         │  │
//! │  │ price lines, total document (medledger_core::pricing)            │  │
//! │  │ balance delta               (PartyRepository)                    │  │
//! │  │ document number             (DocumentNumbering)                  │  │
//! │  │ header + lines, outbox rows                                      │  │
//! │  COMMIT ────────────────────────────────────────────────────────────┘  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  publish LedgerEvent (cannot fail the operation)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error between BEGIN and COMMIT drops the transaction, which rolls
//! back every write of the unit including the number allocation.
//!
//! ## Retry
//! A unit that fails with [`LedgerError::is_retryable`] (SQLite busy, pool
//! exhausted) is run again from the top with exponential backoff until
//! `engine.retry_max_elapsed_ms` has passed. Business errors are returned
//! immediately.

mod delivery;
mod purchase;
mod returns;
mod sale;

use std::future::Future;
use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use chrono::NaiveDate;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use medledger_core::Money;
use medledger_db::Database;

use crate::clock::{Clock, SystemClock};
use crate::config::{EngineSettings, LedgerConfig, NotificationSettings};
use crate::error::LedgerResult;
use crate::events::{EventBus, LedgerEvent};

pub use delivery::{generate_otp, otp_matches};

/// Executes ledger operations against one database.
///
/// Cheap to clone; clones share the pool and the event bus.
#[derive(Debug, Clone)]
pub struct TransactionEngine {
    db: Database,
    settings: EngineSettings,
    notifications: NotificationSettings,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl TransactionEngine {
    pub fn new(db: Database, config: &LedgerConfig) -> Self {
        TransactionEngine {
            db,
            settings: config.engine.clone(),
            notifications: config.notifications.clone(),
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
        }
    }

    /// Replaces the wall clock (tests pin the business date).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shares an existing event bus.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Business date used for expiry checks and numbering.
    pub fn business_date(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Recipient of a high-value alert for an invoice of `net`, if any.
    fn high_value_recipient(&self, net: Money) -> Option<&str> {
        match &self.notifications.alert_email {
            Some(email) if net >= self.notifications.high_value_threshold() => Some(email),
            _ => None,
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.settings.initial_backoff())
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(self.settings.max_elapsed()))
            .build()
    }

    /// Runs `unit` until it succeeds, fails permanently, or the retry
    /// budget is spent.
    async fn run_unit<T, F, Fut>(&self, operation: &'static str, mut unit: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 1u32;

        loop {
            match unit().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Unit of work succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(operation, attempt, ?delay, error = %e, "Unit of work contended, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        error!(operation, attempt, error = %e, "Retry budget exhausted");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use medledger_core::CoreError;
    use medledger_db::{DbConfig, DbError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn engine(config: &LedgerConfig) -> TransactionEngine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        TransactionEngine::new(db, config)
    }

    fn fast_retry() -> LedgerConfig {
        let mut config = LedgerConfig::default();
        config.engine.retry_initial_backoff_ms = 1;
        config.engine.retry_max_elapsed_ms = 500;
        config
    }

    #[tokio::test]
    async fn test_busy_unit_is_retried() {
        let engine = engine(&fast_retry()).await;
        let calls = AtomicU32::new(0);

        let result = engine
            .run_unit("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LedgerError::Db(DbError::Busy("database is locked".into())))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_delay_follows_configured_interval() {
        let mut config = LedgerConfig::default();
        config.engine.retry_initial_backoff_ms = 40;
        let engine = engine(&config).await;

        let mut backoff = engine.create_backoff();
        let first = backoff.next_backoff().unwrap();

        // default randomization factor is 0.5
        assert!(first >= Duration::from_millis(20), "{first:?}");
        assert!(first <= Duration::from_millis(60), "{first:?}");

        let second = backoff.next_backoff().unwrap();
        assert!(second >= Duration::from_millis(40), "{second:?}");
        assert!(second <= Duration::from_millis(120), "{second:?}");
    }

    #[tokio::test]
    async fn test_business_error_is_not_retried() {
        let engine = engine(&fast_retry()).await;
        let calls = AtomicU32::new(0);

        let result: LedgerResult<()> = engine
            .run_unit("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::CustomerNotFound("c-1".into()).into())
            })
            .await;

        assert!(matches!(result, Err(LedgerError::Core(CoreError::CustomerNotFound(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_high_value_recipient_needs_email_and_threshold() {
        let mut config = LedgerConfig::default();
        config.notifications.high_value_threshold_paise = 100_000;
        let without_email = engine(&config).await;
        assert!(without_email
            .high_value_recipient(Money::from_paise(500_000))
            .is_none());

        config.notifications.alert_email = Some("accounts@example.com".into());
        let with_email = engine(&config).await;
        assert_eq!(
            with_email.high_value_recipient(Money::from_paise(100_000)),
            Some("accounts@example.com")
        );
        assert!(with_email
            .high_value_recipient(Money::from_paise(99_999))
            .is_none());
    }
}
