//! # Notification Outbox Repository
//!
//! Queue of side effects (OTP messages, alerts) that must only happen after
//! the document they belong to has committed.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UNIT OF WORK (e.g. create_sale)                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  1. reserve stock, adjust balance, INSERT invoice                │   │
//! │  │  2. INSERT INTO notification_outbox ('DELIVERY_OTP', inv, json)  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← document and notification exist together or not at all       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OUTBOX PROCESSOR (async, post-commit)                                 │
//! │     get_pending → notifier.send → mark_delivered | mark_failed         │
//! │                                                                         │
//! │  A failed send never touches the committed document.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use medledger_core::OutboxEntry;

const OUTBOX_COLUMNS: &str = r#"
    id, kind, entity_id, payload, attempts, last_error, created_at, attempted_at, delivered_at
"#;

/// Repository for the notification outbox.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

impl NotificationOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Queues a notification inside the document's transaction.
    ///
    /// ## Arguments
    /// * `kind` - "DELIVERY_OTP", "HIGH_VALUE_ALERT", ...
    /// * `entity_id` - The document the notification is about
    /// * `payload` - Serialized to JSON for the notifier
    pub async fn enqueue<T: Serialize>(
        tx: &mut Transaction<'_, Sqlite>,
        kind: &str,
        entity_id: &str,
        payload: &T,
    ) -> DbResult<OutboxEntry> {
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            entity_id: entity_id.to_string(),
            payload: serde_json::to_string(payload)?,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            delivered_at: None,
        };

        debug!(kind = %kind, entity_id = %entity_id, "Queuing notification");

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (
                id, kind, entity_id, payload, attempts, last_error,
                created_at, attempted_at, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.kind)
        .bind(&entry.entity_id)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.attempted_at)
        .bind(entry.delivered_at)
        .execute(&mut **tx)
        .await?;

        Ok(entry)
    }

    /// Gets undelivered entries that still have attempts left, oldest first.
    pub async fn get_pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!(
            r#"
            SELECT {OUTBOX_COLUMNS}
            FROM notification_outbox
            WHERE delivered_at IS NULL AND attempts < ?2
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?1
            "#
        );
        let entries = sqlx::query_as::<_, OutboxEntry>(&sql)
            .bind(limit)
            .bind(max_attempts)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Entries queued for one document, oldest first.
    pub async fn for_entity(&self, entity_id: &str) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM notification_outbox WHERE entity_id = ?1 ORDER BY rowid"
        );
        let entries = sqlx::query_as::<_, OutboxEntry>(&sql)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                delivered_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE delivered_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Deletes entries delivered more than `days_old` days ago.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_delivered(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));
        let result = sqlx::query(
            r#"
            DELETE FROM notification_outbox
            WHERE delivered_at IS NOT NULL AND delivered_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;
    use serde_json::json;

    #[tokio::test]
    async fn test_enqueue_only_visible_after_commit() {
        let db = db().await;

        let mut tx = db.begin().await.unwrap();
        NotificationOutboxRepository::enqueue(
            &mut tx,
            "DELIVERY_OTP",
            "inv-1",
            &json!({ "otp": "123456" }),
        )
        .await
        .unwrap();
        drop(tx);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);

        let mut tx = db.begin().await.unwrap();
        let entry = NotificationOutboxRepository::enqueue(
            &mut tx,
            "DELIVERY_OTP",
            "inv-1",
            &json!({ "otp": "123456" }),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let pending = db.outbox().get_pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, entry.id);
        assert!(pending[0].payload.contains("123456"));
    }

    #[tokio::test]
    async fn test_failed_entries_stop_after_max_attempts() {
        let db = db().await;
        let mut tx = db.begin().await.unwrap();
        let entry =
            NotificationOutboxRepository::enqueue(&mut tx, "HIGH_VALUE_ALERT", "inv-9", &"alert")
                .await
                .unwrap();
        tx.commit().await.unwrap();

        db.outbox().mark_failed(&entry.id, "gateway down").await.unwrap();
        db.outbox().mark_failed(&entry.id, "gateway down").await.unwrap();
        assert_eq!(db.outbox().get_pending(10, 3).await.unwrap().len(), 1);
        assert!(db.outbox().get_pending(10, 2).await.unwrap().is_empty());

        let loaded = &db.outbox().for_entity("inv-9").await.unwrap()[0];
        assert_eq!(loaded.attempts, 2);
        assert_eq!(loaded.last_error.as_deref(), Some("gateway down"));
    }

    #[tokio::test]
    async fn test_mark_delivered_and_cleanup() {
        let db = db().await;
        let mut tx = db.begin().await.unwrap();
        let entry = NotificationOutboxRepository::enqueue(&mut tx, "DELIVERY_OTP", "inv-2", &1)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        db.outbox().mark_delivered(&entry.id).await.unwrap();
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);

        // delivered just now, so nothing is old enough to remove
        assert_eq!(db.outbox().cleanup_delivered(7).await.unwrap(), 0);
    }
}
