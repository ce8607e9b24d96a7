//! # Outbox Processor
//!
//! Drains the notification outbox after commit and hands each entry to a
//! [`Notifier`].
//!
//! ## Outbox Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Processor Flow                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 notification_outbox Table                       │   │
//! │  │                                                                 │   │
//! │  │  id | kind             | entity_id | attempts | delivered_at    │   │
//! │  │  ───┼──────────────────┼───────────┼──────────┼──────────────── │   │
//! │  │  1  │ DELIVERY_OTP     │ inv-001   │ 0        │ NULL            │   │
//! │  │  2  │ HIGH_VALUE_ALERT │ inv-001   │ 2        │ NULL            │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               ▼                                         │
//! │  1. Poll: delivered_at IS NULL AND attempts < max, oldest first        │
//! │  2. Decode payload → Notification                                      │
//! │  3. notifier.send()                                                    │
//! │  4. Ok  → mark_delivered                                               │
//! │     Err → mark_failed (attempts += 1, last_error)                      │
//! │                                                                         │
//! │  Failures are logged and never reach the committed document.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use medledger_core::OutboxEntry;
use medledger_db::Database;

use crate::config::NotificationSettings;
use crate::error::{LedgerError, LedgerResult};
use crate::notify::{Notification, Notifier};

/// Outcome of one pass over the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Processes the notification outbox.
pub struct OutboxProcessor {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    settings: NotificationSettings,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling a running processor.
#[derive(Clone)]
pub struct OutboxProcessorHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl OutboxProcessorHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| LedgerError::Config("Outbox processor already stopped".into()))
    }
}

impl OutboxProcessor {
    /// Creates a new outbox processor and returns a handle.
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<dyn Notifier>,
        settings: NotificationSettings,
    ) -> (Self, OutboxProcessorHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let processor = OutboxProcessor {
            db,
            notifier,
            settings,
            shutdown_rx,
        };

        (processor, OutboxProcessorHandle { shutdown_tx })
    }

    /// Runs the poll loop until shutdown.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Outbox processor starting");

        let mut interval = tokio::time::interval(self.settings.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_pending().await {
                        error!(?e, "Failed to process notification outbox");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Outbox processor shutting down");
                    break;
                }
            }
        }

        info!("Outbox processor stopped");
    }

    /// Dispatches one batch of pending entries.
    pub async fn process_pending(&self) -> LedgerResult<DispatchReport> {
        let entries = self
            .db
            .outbox()
            .get_pending(
                self.settings.outbox_batch_size,
                self.settings.max_delivery_attempts,
            )
            .await?;

        if entries.is_empty() {
            debug!("No pending notifications");
            return Ok(DispatchReport::default());
        }

        debug!(count = entries.len(), "Dispatching notifications");

        let mut report = DispatchReport::default();
        for entry in &entries {
            match self.dispatch(entry).await {
                Ok(()) => {
                    self.db.outbox().mark_delivered(&entry.id).await?;
                    report.delivered += 1;
                }
                Err(message) => {
                    error!(
                        id = %entry.id,
                        kind = %entry.kind,
                        entity_id = %entry.entity_id,
                        attempts = entry.attempts + 1,
                        error = %message,
                        "Notification dispatch failed"
                    );
                    self.db.outbox().mark_failed(&entry.id, &message).await?;
                    report.failed += 1;
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            "Notification batch processed"
        );
        Ok(report)
    }

    async fn dispatch(&self, entry: &OutboxEntry) -> Result<(), String> {
        let notification = Notification::from_payload(&entry.payload).map_err(|e| e.to_string())?;
        self.notifier
            .send(&notification)
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotifyError, DELIVERY_OTP};
    use async_trait::async_trait;
    use medledger_db::{DbConfig, NotificationOutboxRepository};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyNotifier {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, _: &Notification) -> Result<(), NotifyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(NotifyError::Unavailable("sms gateway timeout".into()))
            } else {
                Ok(())
            }
        }
    }

    async fn db_with_entry() -> Arc<Database> {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        let n = Notification::DeliveryOtp {
            invoice_id: "inv-1".into(),
            invoice_number: "INV-202610-000001".into(),
            customer_name: "City Chemists".into(),
            phone: Some("+919800000000".into()),
            otp: "123456".into(),
        };
        NotificationOutboxRepository::enqueue(&mut tx, DELIVERY_OTP, "inv-1", &n)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        Arc::new(db)
    }

    #[tokio::test]
    async fn test_failed_send_is_retried_on_next_pass() {
        let db = db_with_entry().await;
        let notifier = Arc::new(FlakyNotifier {
            calls: AtomicUsize::new(0),
            fail_first: 1,
        });
        let (processor, _handle) =
            OutboxProcessor::new(db.clone(), notifier, NotificationSettings::default());

        let first = processor.process_pending().await.unwrap();
        assert_eq!(first, DispatchReport { delivered: 0, failed: 1 });
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);

        let second = processor.process_pending().await.unwrap();
        assert_eq!(second, DispatchReport { delivered: 1, failed: 0 });
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let db = db_with_entry().await;
        let notifier = Arc::new(FlakyNotifier {
            calls: AtomicUsize::new(0),
            fail_first: usize::MAX,
        });
        let settings = NotificationSettings {
            max_delivery_attempts: 2,
            ..Default::default()
        };
        let (processor, _handle) = OutboxProcessor::new(db.clone(), notifier, settings);

        processor.process_pending().await.unwrap();
        processor.process_pending().await.unwrap();
        let third = processor.process_pending().await.unwrap();
        assert_eq!(third, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let db = db_with_entry().await;
        let (processor, handle) = OutboxProcessor::new(
            db.clone(),
            Arc::new(crate::notify::LoggingNotifier),
            NotificationSettings::default(),
        );

        let task = tokio::spawn(processor.run());
        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
