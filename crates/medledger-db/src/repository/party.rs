//! # Party Repository & Balance Ledger
//!
//! Local projection of customers and suppliers plus their running balances.
//!
//! ## Balance Journal
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  adjust_balance(tx, party, +118000, Invoice, inv-1)                     │
//! │       │                                                                 │
//! │       ├── UPDATE parties SET balance_paise = balance_paise + δ          │
//! │       │   RETURNING balance_paise                   → 118000            │
//! │       │                                                                 │
//! │       └── INSERT balance_entries (δ, kind, doc, balance_after)          │
//! │                                                                         │
//! │  reconcile(party) ⇔ parties.balance_paise == Σ balance_entries.δ        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Positive deltas increase what the party owes us (customer) or what we
//! owe them (supplier). Only the transaction engine calls `adjust_balance`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medledger_core::{BalanceEntry, DocumentKind, Money, Party, PartyKind};

const PARTY_COLUMNS: &str = r#"
    id, kind, name, tax_id, phone, email, balance_paise, created_at, updated_at
"#;

/// Input for registering a party in the local projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParty {
    pub kind: PartyKind,
    pub name: String,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Repository for customers and suppliers.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    /// Inserts a party with zero balance.
    pub async fn insert(&self, new: NewParty) -> DbResult<Party> {
        let now = Utc::now();
        let party = Party {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            name: new.name.trim().to_string(),
            tax_id: new.tax_id,
            phone: new.phone,
            email: new.email,
            balance_paise: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %party.id, kind = ?party.kind, "Inserting party");

        sqlx::query(
            r#"
            INSERT INTO parties (
                id, kind, name, tax_id, phone, email, balance_paise, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&party.id)
        .bind(party.kind)
        .bind(&party.name)
        .bind(&party.tax_id)
        .bind(&party.phone)
        .bind(&party.email)
        .bind(party.balance_paise)
        .bind(party.created_at)
        .bind(party.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(party)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Party>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Gets a party of the given kind; a supplier id passed as a customer
    /// is treated as not found.
    pub async fn find_of_kind(
        conn: &mut SqliteConnection,
        id: &str,
        kind: PartyKind,
    ) -> DbResult<Option<Party>> {
        Ok(Self::find(conn, id).await?.filter(|p| p.kind == kind))
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Party>> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM parties WHERE id = ?1");
        let party = sqlx::query_as::<_, Party>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(party)
    }

    // =========================================================================
    // Balance Ledger
    // =========================================================================

    /// Applies `delta` to the party's balance and journals it.
    ///
    /// ## Returns
    /// The new balance.
    pub async fn adjust_balance(
        tx: &mut Transaction<'_, Sqlite>,
        party_id: &str,
        delta: Money,
        document_kind: DocumentKind,
        document_id: &str,
    ) -> DbResult<Money> {
        let now = Utc::now();

        let new_balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE parties SET
                balance_paise = balance_paise + ?2,
                updated_at = ?3
            WHERE id = ?1
            RETURNING balance_paise
            "#,
        )
        .bind(party_id)
        .bind(delta.paise())
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;

        let new_balance = new_balance.ok_or_else(|| DbError::not_found("Party", party_id))?;

        sqlx::query(
            r#"
            INSERT INTO balance_entries (
                id, party_id, delta_paise, document_kind, document_id,
                balance_after_paise, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(party_id)
        .bind(delta.paise())
        .bind(document_kind)
        .bind(document_id)
        .bind(new_balance)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        debug!(
            party_id = %party_id,
            delta = %delta,
            balance = %Money::from_paise(new_balance),
            kind = %document_kind,
            "Balance adjusted"
        );

        Ok(Money::from_paise(new_balance))
    }

    /// Journal entries for a party, oldest first.
    pub async fn balance_entries(&self, party_id: &str) -> DbResult<Vec<BalanceEntry>> {
        let entries = sqlx::query_as::<_, BalanceEntry>(
            r#"
            SELECT id, party_id, delta_paise, document_kind, document_id,
                   balance_after_paise, created_at
            FROM balance_entries
            WHERE party_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(party_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Checks that the stored balance equals the sum of its journal.
    pub async fn reconcile(&self, party_id: &str) -> DbResult<bool> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.balance_paise,
                   COALESCE((SELECT SUM(delta_paise) FROM balance_entries e
                             WHERE e.party_id = p.id), 0)
            FROM parties p
            WHERE p.id = ?1
            "#,
        )
        .bind(party_id)
        .fetch_optional(&self.pool)
        .await?;

        let (balance, journal) = row.ok_or_else(|| DbError::not_found("Party", party_id))?;
        Ok(balance == journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, party};

    #[tokio::test]
    async fn test_insert_and_find_of_kind() {
        let db = db().await;
        let c = party(&db, PartyKind::Customer, "City Chemists").await;

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(PartyRepository::find_of_kind(&mut conn, &c.id, PartyKind::Customer)
            .await
            .unwrap()
            .is_some());
        assert!(PartyRepository::find_of_kind(&mut conn, &c.id, PartyKind::Supplier)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_adjust_balance_journals_and_reconciles() {
        let db = db().await;
        let c = party(&db, PartyKind::Customer, "Lakeview Pharmacy").await;

        let mut tx = db.begin().await.unwrap();
        let after = PartyRepository::adjust_balance(
            &mut tx,
            &c.id,
            Money::from_paise(118_000),
            DocumentKind::Invoice,
            "inv-1",
        )
        .await
        .unwrap();
        assert_eq!(after.paise(), 118_000);

        let after = PartyRepository::adjust_balance(
            &mut tx,
            &c.id,
            Money::from_paise(-18_000),
            DocumentKind::CreditNote,
            "cn-1",
        )
        .await
        .unwrap();
        assert_eq!(after.paise(), 100_000);
        tx.commit().await.unwrap();

        let loaded = db.parties().get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.balance().paise(), 100_000);

        let entries = db.parties().balance_entries(&c.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].balance_after_paise, 100_000);
        assert_eq!(entries[1].document_kind, DocumentKind::CreditNote);
        assert!(db.parties().reconcile(&c.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rolled_back_adjustment_leaves_no_trace() {
        let db = db().await;
        let s = party(&db, PartyKind::Supplier, "Ganga Distributors").await;

        let mut tx = db.begin().await.unwrap();
        PartyRepository::adjust_balance(
            &mut tx,
            &s.id,
            Money::from_paise(5_000),
            DocumentKind::PurchaseBill,
            "bill-1",
        )
        .await
        .unwrap();
        drop(tx);

        let loaded = db.parties().get_by_id(&s.id).await.unwrap().unwrap();
        assert!(loaded.balance().is_zero());
        assert!(db.parties().balance_entries(&s.id).await.unwrap().is_empty());
        assert!(db.parties().reconcile(&s.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_adjust_missing_party() {
        let db = db().await;
        let mut tx = db.begin().await.unwrap();
        let err = PartyRepository::adjust_balance(
            &mut tx,
            "ghost",
            Money::from_paise(1),
            DocumentKind::Invoice,
            "inv-x",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
