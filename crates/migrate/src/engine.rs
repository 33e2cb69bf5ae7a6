//! Apply engine - executes the pending set
//!
//! Computes pending = available − applied and applies each pending
//! changeset in ascending name order, one transaction per changeset,
//! with the ledger insert riding in the same transaction. Any failure
//! rolls the current transaction back and aborts the whole run:
//! changesets are assumed to have ordering dependencies, so a failed
//! step must never be skipped silently.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use sqlx::{Executor, PgPool};

use crate::error::{MigrateError, MigrateResult};
use crate::ledger::Ledger;
use crate::source::{Changeset, MigrationSource};

/// Result of one engine run
#[derive(Debug, Serialize)]
pub struct ApplyReport {
    /// Names of changesets applied by this run, in apply order
    pub applied: Vec<String>,
    /// Total ledger entries at the start of the run (includes entries
    /// whose files are no longer present in the source)
    pub skipped_count: usize,
    /// Total wall-clock time for the run
    pub execution_time_ms: u128,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// The pending subset of `available`: everything whose name is not in
/// `applied`, preserving the order of `available`.
pub fn pending_set(available: Vec<Changeset>, applied: &HashSet<String>) -> Vec<Changeset> {
    available
        .into_iter()
        .filter(|c| !applied.contains(&c.name))
        .collect()
}

/// Applies pending changesets transactionally, in order.
pub struct ApplyEngine {
    source: MigrationSource,
    ledger: Ledger,
}

impl ApplyEngine {
    pub fn new(source: MigrationSource, ledger: Ledger) -> Self {
        Self { source, ledger }
    }

    /// Apply every pending changeset, sequentially and in ascending name
    /// order. Stops at the first failure; already-committed changesets
    /// stay committed, so a re-run resumes at the failed one.
    pub async fn apply_pending(&self, pool: &PgPool) -> MigrateResult<ApplyReport> {
        let start = Instant::now();

        let available = self.source.list_available()?;
        let applied: HashSet<String> = self
            .ledger
            .list_applied(pool)
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect();

        let skipped_count = applied.len();
        let pending = pending_set(available, &applied);

        if pending.is_empty() {
            tracing::info!("no pending changesets, ledger is up to date");
            return Ok(ApplyReport {
                applied: Vec::new(),
                skipped_count,
                execution_time_ms: start.elapsed().as_millis(),
            });
        }

        let mut applied_names = Vec::with_capacity(pending.len());
        for changeset in &pending {
            self.apply_one(pool, changeset).await?;
            applied_names.push(changeset.name.clone());
        }

        Ok(ApplyReport {
            applied: applied_names,
            skipped_count,
            execution_time_ms: start.elapsed().as_millis(),
        })
    }

    /// Apply a single changeset: body read, transaction, SQL batch,
    /// ledger insert, commit. The body is read before the transaction
    /// opens so a read failure never leaves a transaction dangling.
    async fn apply_one(&self, pool: &PgPool, changeset: &Changeset) -> MigrateResult<()> {
        let body = changeset.read_body()?;

        tracing::info!(changeset = %changeset.name, "applying changeset");

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| MigrateError::store("failed to start transaction", e))?;

        if body.trim().is_empty() {
            // A no-op changeset is still recorded so it never shows up
            // as pending again, but it is worth a warning: an empty file
            // is more often a mistake than an intent.
            tracing::warn!(changeset = %changeset.name, "changeset body is empty, recording as applied");
        } else {
            // The full body goes out as one batch over the simple query
            // protocol, so multi-statement files run in a single round
            // trip inside this transaction.
            (&mut *tx)
                .execute(body.as_str())
                .await
                .map_err(|e| MigrateError::ChangesetExecution {
                    name: changeset.name.clone(),
                    source: e,
                })?;
        }

        self.ledger.record_applied(&mut tx, &changeset.name).await?;

        tx.commit()
            .await
            .map_err(|e| MigrateError::ChangesetExecution {
                name: changeset.name.clone(),
                source: e,
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn changeset(name: &str) -> Changeset {
        Changeset {
            name: name.to_string(),
            path: PathBuf::from(format!("migrations/{}", name)),
        }
    }

    #[test]
    fn pending_preserves_available_order() {
        let available = vec![
            changeset("001_init.sql"),
            changeset("002_add_col.sql"),
            changeset("003_index.sql"),
        ];
        let applied = HashSet::from(["002_add_col.sql".to_string()]);

        let names: Vec<_> = pending_set(available, &applied)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["001_init.sql", "003_index.sql"]);
    }

    #[test]
    fn fully_applied_source_yields_empty_pending() {
        let available = vec![changeset("001_init.sql"), changeset("002_add_col.sql")];
        let applied = HashSet::from([
            "001_init.sql".to_string(),
            "002_add_col.sql".to_string(),
        ]);
        assert!(pending_set(available, &applied).is_empty());
    }

    #[test]
    fn empty_available_yields_empty_pending() {
        let applied = HashSet::from(["001_init.sql".to_string()]);
        assert!(pending_set(Vec::new(), &applied).is_empty());
    }

    #[test]
    fn difference_is_by_exact_name() {
        // "001_init" without the extension is a different key
        let available = vec![changeset("001_init.sql")];
        let applied = HashSet::from(["001_init".to_string()]);
        assert_eq!(pending_set(available, &applied).len(), 1);
    }
}
