//! Runner configuration
//!
//! Everything the runner reads once at startup: the database connection
//! string, the optional SSL mode, the changeset source directory, the
//! ledger table name, and pool sizing.

use std::path::PathBuf;
use std::str::FromStr;

use sqlx::postgres::PgSslMode;

/// TLS requirement for the database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Never use TLS.
    Disable,
    /// Use TLS if the server supports it.
    #[default]
    Prefer,
    /// Refuse to connect without TLS.
    Require,
}

impl SslMode {
    pub(crate) fn to_pg(self) -> PgSslMode {
        match self {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
        }
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            other => Err(format!(
                "invalid ssl mode '{}' (expected disable, prefer, or require)",
                other
            )),
        }
    }
}

/// Configuration for the migration runner
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Postgres connection string
    pub database_url: String,
    /// TLS requirement for the connection
    pub ssl_mode: SslMode,
    /// Directory where changeset files are stored
    pub migrations_dir: PathBuf,
    /// Table name for the applied-changeset ledger
    pub ledger_table: String,
    /// Maximum pool size; the engine only ever holds one write
    /// transaction at a time, so this stays small
    pub max_connections: u32,
}

impl MigrateConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ssl_mode: SslMode::default(),
            migrations_dir: PathBuf::from("migrations"),
            ledger_table: "sqlstep_migrations".to_string(),
            max_connections: 5,
        }
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = table.into();
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}
