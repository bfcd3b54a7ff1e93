//! Error types for the migration tool.

use std::path::PathBuf;

use keel_core::{DialectKind, ParseError};

/// Errors that can occur while planning or writing migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Diffing or SQL generation failed.
    #[error(transparent)]
    Core(#[from] keel_core::Error),

    /// A schema file is invalid.
    #[error("Failed to load schema file '{path}': {source}")]
    Schema {
        /// Path to the schema file.
        path: PathBuf,
        /// The loader error.
        source: ParseError,
    },

    /// IO error (reading schemas, reading or writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Neither the command line, the environment nor the schema name a
    /// dialect.
    #[error(
        "No dialect configured: pass --dialect, set KEEL_DIALECT or declare a datasource provider"
    )]
    MissingDialect,

    /// The requested dialect differs from the one recorded by earlier
    /// migrations.
    #[error("Dialect mismatch: existing migrations target {recorded}, requested {requested}")]
    ProviderMismatch {
        /// Dialect recorded in the latest snapshot.
        recorded: DialectKind,
        /// Dialect of the new migration.
        requested: DialectKind,
    },

    /// Replaying the planned changes does not reproduce the target schema.
    #[error("Migration plan does not reproduce schema '{0}'")]
    PlanMismatch(String),

    /// Migration directory already exists.
    #[error("Migration already exists: {0}")]
    MigrationExists(PathBuf),

    /// A migration directory is missing its snapshot.
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(PathBuf),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
