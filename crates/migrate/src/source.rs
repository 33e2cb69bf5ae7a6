//! Migration source - changeset discovery on the filesystem
//!
//! Scans a designated directory for `.sql` changeset files and returns
//! them sorted ascending by file name. The file name (including the
//! extension) is the changeset's ledger key, so callers must prefix
//! files with zero-padded sequence numbers or sortable timestamps to
//! make lexicographic order match intended apply order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, MigrateResult};

/// Recognized changeset file extension
const CHANGESET_EXTENSION: &str = "sql";

/// A single changeset discovered in the source directory.
///
/// Holds only the name and path; the SQL body is read lazily at apply
/// time so a long pending set never sits in memory at once and read
/// errors surface at the point of use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    /// Ledger key: the file's base name including extension
    pub name: String,
    /// Absolute or source-relative path to the file
    pub path: PathBuf,
}

impl Changeset {
    /// Read the full SQL body of this changeset from disk.
    pub fn read_body(&self) -> MigrateResult<String> {
        fs::read_to_string(&self.path)
            .map_err(|e| MigrateError::source_read(self.path.display().to_string(), e))
    }
}

/// Enumerates available changesets from a directory.
#[derive(Debug, Clone)]
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new, empty changeset file named so it sorts after every
    /// existing one: `YYYYMMDDHHMMSS_<name>.sql`. Creates the source
    /// directory if needed.
    pub fn create_changeset(&self, name: &str) -> MigrateResult<PathBuf> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| MigrateError::source_read(self.dir.display().to_string(), e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let filename = format!(
            "{}_{}.{}",
            timestamp,
            name.trim().replace(char::is_whitespace, "_").to_lowercase(),
            CHANGESET_EXTENSION
        );
        let path = self.dir.join(&filename);

        let template = format!(
            "-- Changeset: {}\n-- Created: {}\n\n",
            name,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        fs::write(&path, template)
            .map_err(|e| MigrateError::source_read(path.display().to_string(), e))?;

        Ok(path)
    }

    /// List every changeset in the source directory, sorted ascending by
    /// name.
    ///
    /// Re-reads the directory on every call so the pending set always
    /// reflects the current file state. A missing or unreadable
    /// directory is an error, not an empty set: a runner pointed at the
    /// wrong path must fail loudly rather than report "nothing to do".
    pub fn list_available(&self) -> MigrateResult<Vec<Changeset>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| MigrateError::source_read(self.dir.display().to_string(), e))?;

        let mut changesets = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| MigrateError::source_read(self.dir.display().to_string(), e))?;
            let path = entry.path();

            if !path
                .extension()
                .map_or(false, |ext| ext == CHANGESET_EXTENSION)
            {
                continue;
            }

            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                // Non-UTF-8 names cannot be ledger keys; skip them
                None => continue,
            };

            changesets.push(Changeset { name, path });
        }

        changesets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(changesets)
    }
}
