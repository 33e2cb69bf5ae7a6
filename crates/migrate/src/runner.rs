//! Runner - top-level orchestration
//!
//! Owns the connection pool for the duration of one run: connect,
//! ensure the ledger table, apply the pending set, and release the pool
//! on every exit path. Migrations are a preflight step for the
//! application, not a service; any unrecoverable error propagates out
//! so the process can exit non-zero.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::config::MigrateConfig;
use crate::engine::{pending_set, ApplyEngine, ApplyReport};
use crate::error::{MigrateError, MigrateResult};
use crate::ledger::Ledger;
use crate::source::MigrationSource;

/// Applied/pending state of one changeset, as reported by `status`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChangesetState {
    Applied { applied_at: DateTime<Utc> },
    Pending,
}

/// One line of `status` output
#[derive(Debug, Serialize)]
pub struct ChangesetStatus {
    pub name: String,
    #[serde(flatten)]
    pub state: ChangesetState,
}

/// Top-level migration runner.
pub struct Runner {
    config: MigrateConfig,
    source: MigrationSource,
    ledger: Ledger,
}

impl Runner {
    pub fn new(config: MigrateConfig) -> Self {
        let source = MigrationSource::new(&config.migrations_dir);
        let ledger = Ledger::new(&config.ledger_table);
        Self {
            config,
            source,
            ledger,
        }
    }

    /// Apply all pending changesets. The pool is closed before this
    /// returns, on success and on failure alike.
    pub async fn run(&self) -> MigrateResult<ApplyReport> {
        let pool = self.connect().await?;
        let result = self.run_with_pool(&pool).await;
        pool.close().await;
        result
    }

    /// Report the applied/pending state of every available changeset.
    /// Read-only apart from creating the ledger table if absent.
    pub async fn status(&self) -> MigrateResult<Vec<ChangesetStatus>> {
        let pool = self.connect().await?;
        let result = self.status_with_pool(&pool).await;
        pool.close().await;
        result
    }

    /// Run against an externally owned pool. The caller keeps
    /// responsibility for closing it.
    pub async fn run_with_pool(&self, pool: &PgPool) -> MigrateResult<ApplyReport> {
        self.ledger.ensure_table(pool).await?;

        let engine = ApplyEngine::new(self.source.clone(), self.ledger.clone());
        let report = engine.apply_pending(pool).await?;

        tracing::info!(
            applied = report.applied_count(),
            skipped = report.skipped_count,
            elapsed_ms = report.execution_time_ms,
            "migration run complete"
        );
        Ok(report)
    }

    pub async fn status_with_pool(&self, pool: &PgPool) -> MigrateResult<Vec<ChangesetStatus>> {
        self.ledger.ensure_table(pool).await?;

        let available = self.source.list_available()?;
        let entries = self.ledger.list_applied(pool).await?;

        let applied_at_by_name: std::collections::HashMap<String, DateTime<Utc>> = entries
            .into_iter()
            .map(|entry| (entry.name, entry.applied_at))
            .collect();

        Ok(available
            .into_iter()
            .map(|changeset| {
                let state = match applied_at_by_name.get(&changeset.name) {
                    Some(applied_at) => ChangesetState::Applied {
                        applied_at: *applied_at,
                    },
                    None => ChangesetState::Pending,
                };
                ChangesetStatus {
                    name: changeset.name,
                    state,
                }
            })
            .collect())
    }

    /// Count of changesets that would be applied by `run`, without
    /// opening any transaction.
    pub async fn pending_count(&self, pool: &PgPool) -> MigrateResult<usize> {
        self.ledger.ensure_table(pool).await?;
        let available = self.source.list_available()?;
        let applied = self
            .ledger
            .list_applied(pool)
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        Ok(pending_set(available, &applied).len())
    }

    async fn connect(&self) -> MigrateResult<PgPool> {
        let options = PgConnectOptions::from_str(&self.config.database_url)
            .map_err(|e| MigrateError::store("invalid database url", e))?
            .ssl_mode(self.config.ssl_mode.to_pg());

        PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::store("failed to connect to database", e))
    }
}
