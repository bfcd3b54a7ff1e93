//! Migration history.
//!
//! Migrations live in one directory each, named
//! `<YYYYMMDDHHMMSS>_<name>`, holding `migration.sql` and `snapshot.json`:
//! the schema the migration produces. Directories are ordered by name, so
//! the latest snapshot is the starting point of the next migration.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use keel_core::{Change, Differ, SchemaDiff, SchemaSnapshot};
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

/// Timestamp format of migration directory names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// SQL file inside a migration directory.
pub const MIGRATION_FILE: &str = "migration.sql";

/// Snapshot file inside a migration directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// A migration found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    /// Directory name, `<timestamp>_<name>`.
    pub id: String,
    /// Creation time encoded in the directory name.
    pub created_at: NaiveDateTime,
    /// Migration name.
    pub name: String,
    /// Path to the migration directory.
    pub path: PathBuf,
}

impl MigrationEntry {
    /// Parses a migration directory name.
    #[must_use]
    pub fn parse(path: &Path) -> Option<Self> {
        let id = path.file_name()?.to_str()?;
        let (timestamp, name) = id.split_once('_')?;
        if timestamp.len() != 14 || name.is_empty() {
            return None;
        }
        let created_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            id: id.to_string(),
            created_at,
            name: name.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Returns the path of the SQL file.
    #[must_use]
    pub fn sql_path(&self) -> PathBuf {
        self.path.join(MIGRATION_FILE)
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_FILE)
    }

    /// Reads the snapshot the migration produces.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is missing or malformed.
    pub fn load_snapshot(&self) -> Result<SchemaSnapshot> {
        let path = self.snapshot_path();
        if !path.is_file() {
            return Err(MigrateError::SnapshotNotFound(path));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Migrations in a directory compared with the current schema.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Migrations in order.
    pub migrations: Vec<MigrationEntry>,
    /// Changes between the latest snapshot and the schema.
    pub pending: SchemaDiff,
}

impl MigrationStatus {
    /// Returns `true` if the latest migration matches the schema.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending changes that drop tables or columns.
    pub fn destructive_changes(&self) -> impl Iterator<Item = &Change> {
        self.pending.changes.iter().filter(|c| c.is_destructive())
    }
}

/// Reads the migrations directory.
#[derive(Debug, Clone)]
pub struct MigrationHistory {
    dir: PathBuf,
}

impl MigrationHistory {
    /// Creates a history over `dir`. The directory does not need to
    /// exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the migrations directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists migrations, oldest first. Entries that are not migration
    /// directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn migrations(&self) -> Result<Vec<MigrationEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut migrations = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            match MigrationEntry::parse(&path) {
                Some(migration) => migrations.push(migration),
                None => warn!(path = %path.display(), "skipping unrecognized directory"),
            }
        }
        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(dir = %self.dir.display(), count = migrations.len(), "read migrations");
        Ok(migrations)
    }

    /// Returns the most recent migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn latest(&self) -> Result<Option<MigrationEntry>> {
        Ok(self.migrations()?.pop())
    }

    /// Returns the schema produced by the most recent migration, or an
    /// empty schema if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the latest snapshot cannot be read.
    pub fn latest_snapshot(&self) -> Result<SchemaSnapshot> {
        match self.latest()? {
            Some(migration) => migration.load_snapshot(),
            None => Ok(SchemaSnapshot::new("empty")),
        }
    }

    /// Compares the latest snapshot with `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read or the diff fails.
    pub fn status(&self, schema: &SchemaSnapshot, differ: &Differ) -> Result<MigrationStatus> {
        let migrations = self.migrations()?;
        let latest = match migrations.last() {
            Some(migration) => migration.load_snapshot()?,
            None => SchemaSnapshot::new("empty"),
        };
        let pending = differ.diff(&latest, schema)?;
        Ok(MigrationStatus {
            migrations,
            pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{Column, DataType, Table};
    use tempfile::TempDir;

    fn write_migration(dir: &Path, id: &str, snapshot: &SchemaSnapshot) {
        let path = dir.join(id);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(MIGRATION_FILE), "").unwrap();
        fs::write(
            path.join(SNAPSHOT_FILE),
            serde_json::to_string(snapshot).unwrap(),
        )
        .unwrap();
    }

    fn tags() -> SchemaSnapshot {
        SchemaSnapshot::new("tags")
            .with_table(Table::new("tags").with_column(Column::new("label", DataType::Text)))
    }

    #[test]
    fn test_parse_entry() {
        let entry = MigrationEntry::parse(Path::new("migrations/20260102030405_add_tags")).unwrap();
        assert_eq!(entry.name, "add_tags");
        assert_eq!(
            entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2026-01-02 03:04:05"
        );
        assert!(entry.sql_path().ends_with("20260102030405_add_tags/migration.sql"));

        assert!(MigrationEntry::parse(Path::new("migrations/notes")).is_none());
        assert!(MigrationEntry::parse(Path::new("migrations/2026_init")).is_none());
        assert!(MigrationEntry::parse(Path::new("migrations/20261399000000_bad")).is_none());
    }

    #[test]
    fn test_empty_history() {
        let dir = TempDir::new().unwrap();
        let history = MigrationHistory::new(dir.path().join("missing"));
        assert!(history.migrations().unwrap().is_empty());
        assert!(history.latest_snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_latest_snapshot_in_name_order() {
        let dir = TempDir::new().unwrap();
        write_migration(dir.path(), "20260102000000_second", &tags());
        write_migration(dir.path(), "20260101000000_first", &SchemaSnapshot::new("first"));
        fs::create_dir_all(dir.path().join("scratch")).unwrap();

        let history = MigrationHistory::new(dir.path());
        let ids: Vec<String> = history
            .migrations()
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["20260101000000_first", "20260102000000_second"]);
        assert_eq!(history.latest_snapshot().unwrap(), tags());
    }

    #[test]
    fn test_missing_snapshot() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("20260101000000_init")).unwrap();
        let err = MigrationHistory::new(dir.path())
            .latest_snapshot()
            .unwrap_err();
        assert!(matches!(err, MigrateError::SnapshotNotFound(_)));
    }

    #[test]
    fn test_status() {
        let dir = TempDir::new().unwrap();
        write_migration(dir.path(), "20260101000000_init", &tags());
        let history = MigrationHistory::new(dir.path());
        let differ = Differ::default();

        let status = history.status(&tags(), &differ).unwrap();
        assert_eq!(status.migrations.len(), 1);
        assert!(status.is_up_to_date());

        let mut changed = tags();
        changed.tables[0]
            .columns
            .push(Column::new("color", DataType::Text));
        let status = history.status(&changed, &differ).unwrap();
        assert!(!status.is_up_to_date());
        assert_eq!(status.pending.changes.len(), 1);
        assert_eq!(status.destructive_changes().count(), 0);

        let status = history
            .status(&SchemaSnapshot::new("empty"), &differ)
            .unwrap();
        let destructive: Vec<&str> = status.destructive_changes().map(Change::kind).collect();
        assert_eq!(destructive, vec!["DropTable"]);
    }
}
