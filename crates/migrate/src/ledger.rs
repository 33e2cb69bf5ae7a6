//! Ledger store - durable record of applied changesets
//!
//! One row per applied changeset, created inside the same transaction as
//! the changeset's own SQL, never updated or deleted afterwards. The
//! unique constraint on `name` is the at-most-once guarantee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::error::{MigrateError, MigrateResult};

/// A single row in the ledger table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Insertion order; ascending ids follow apply order
    pub id: i64,
    /// Changeset file name, unique across all entries
    pub name: String,
    /// When the changeset's transaction committed
    pub applied_at: DateTime<Utc>,
}

/// Durable record of which changesets have been applied.
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it does not exist. Safe to call on
    /// every run.
    pub async fn ensure_table(&self, pool: &PgPool) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id BIGSERIAL PRIMARY KEY,\n    \
                name VARCHAR(255) NOT NULL UNIQUE,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
            );",
            self.table
        );
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| MigrateError::store("failed to create ledger table", e))?;
        Ok(())
    }

    /// All ledger entries, ordered by insertion id ascending.
    pub async fn list_applied(&self, pool: &PgPool) -> MigrateResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT id, name, applied_at FROM {} ORDER BY id ASC",
            self.table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(pool)
            .await
            .map_err(|e| MigrateError::store("failed to query applied changesets", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row
                .try_get("id")
                .map_err(|e| MigrateError::store("failed to read ledger id", e))?;
            let name: String = row
                .try_get("name")
                .map_err(|e| MigrateError::store("failed to read ledger name", e))?;
            let applied_at: DateTime<Utc> = row
                .try_get("applied_at")
                .map_err(|e| MigrateError::store("failed to read ledger applied_at", e))?;
            entries.push(LedgerEntry {
                id,
                name,
                applied_at,
            });
        }
        Ok(entries)
    }

    /// Record `name` as applied, inside the caller's open transaction.
    ///
    /// Always invoked together with the changeset's own SQL so the entry
    /// commits (or rolls back) with it; never called standalone.
    pub async fn record_applied(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> MigrateResult<()> {
        let sql = format!("INSERT INTO {} (name) VALUES ($1)", self.table);
        sqlx::query(&sql)
            .bind(name)
            .execute(&mut **tx)
            .await
            .map_err(|e| MigrateError::store("failed to record applied changeset", e))?;
        Ok(())
    }
}
