//! # sqlstep-migrate: versioned SQL migration runner
//!
//! Applies `.sql` changeset files from a directory to a PostgreSQL
//! database exactly once, in ascending file-name order, one transaction
//! per changeset. A ledger table records what has been applied; re-runs
//! skip recorded changesets, so the runner is safe to execute on every
//! deploy as a preflight step.
//!
//! The core pieces:
//! - [`MigrationSource`] discovers changeset files (sorted, re-scanned
//!   on every call, bodies read lazily at apply time)
//! - [`Ledger`] owns the applied-changeset table
//! - [`ApplyEngine`] computes the pending set and applies it with
//!   fail-fast, at-most-once, ordered semantics
//! - [`Runner`] wires them together, owns the connection pool, and
//!   guarantees its release

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod runner;
pub mod source;

pub use config::{MigrateConfig, SslMode};
pub use engine::{pending_set, ApplyEngine, ApplyReport};
pub use error::{MigrateError, MigrateResult};
pub use ledger::{Ledger, LedgerEntry};
pub use runner::{ChangesetState, ChangesetStatus, Runner};
pub use source::{Changeset, MigrationSource};
