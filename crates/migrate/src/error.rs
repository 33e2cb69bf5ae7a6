//! Error types for the migration system
//!
//! Every failure the runner can hit maps onto one of three fatal kinds:
//! the ledger store is unreachable, a changeset could not be read from
//! the source directory, or a changeset's SQL failed mid-execution.
//! None of them are retried locally; they propagate to the runner as-is.

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The ledger table could not be created or queried (connection,
    /// auth, or privilege failure). Aborts the run.
    #[error("ledger store unavailable: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    /// The migrations directory is missing or a changeset file could not
    /// be read. Raised before any transaction opens for that changeset.
    #[error("failed to read changeset source '{path}': {source}")]
    SourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A changeset's SQL body failed during execution. Its transaction is
    /// rolled back and no ledger entry is written.
    #[error("changeset '{name}' failed: {source}")]
    ChangesetExecution {
        name: String,
        #[source]
        source: sqlx::Error,
    },
}

impl MigrateError {
    pub(crate) fn store(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::StoreUnavailable {
            message: context.into(),
            source,
        }
    }

    pub(crate) fn source_read(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::SourceRead {
            path: path.into(),
            source,
        }
    }

    /// Name of the changeset this error is attached to, if any.
    pub fn changeset_name(&self) -> Option<&str> {
        match self {
            Self::ChangesetExecution { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_names_the_changeset() {
        let err = MigrateError::ChangesetExecution {
            name: "002_add_col.sql".to_string(),
            source: sqlx::Error::PoolClosed,
        };
        assert_eq!(err.changeset_name(), Some("002_add_col.sql"));
        assert!(err.to_string().contains("002_add_col.sql"));
    }

    #[test]
    fn store_error_carries_context() {
        let err = MigrateError::store("failed to create ledger table", sqlx::Error::PoolClosed);
        assert!(err.to_string().starts_with("ledger store unavailable"));
        assert!(err.changeset_name().is_none());
    }
}
