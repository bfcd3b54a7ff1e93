//! Resolved tool settings.

use std::path::PathBuf;

use keel_core::{DiffOptions, DialectKind, RenamePolicy, SchemaSnapshot};

use crate::error::{MigrateError, Result};

/// Default schema file.
pub const DEFAULT_SCHEMA: &str = "schema.keel";

/// Default migrations directory.
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Settings shared by all commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateConfig {
    /// Schema file describing the target state.
    pub schema: PathBuf,
    /// Directory holding one subdirectory per migration.
    pub migrations_dir: PathBuf,
    /// Dialect given on the command line or in the environment.
    pub dialect: Option<DialectKind>,
    /// Accept drop+add pairs that look like renames.
    pub allow_drop_add: bool,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            schema: PathBuf::from(DEFAULT_SCHEMA),
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            dialect: None,
            allow_drop_add: false,
        }
    }
}

impl MigrateConfig {
    /// Returns the configured dialect, or else the provider declared by
    /// `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MissingDialect`] if neither is set.
    pub fn resolve_dialect(&self, schema: &SchemaSnapshot) -> Result<DialectKind> {
        self.dialect
            .or(schema.provider)
            .ok_or(MigrateError::MissingDialect)
    }

    /// Returns the differ options for `dialect`.
    #[must_use]
    pub const fn diff_options(&self, dialect: DialectKind) -> DiffOptions {
        let rename_policy = if self.allow_drop_add {
            RenamePolicy::DropAndAdd
        } else {
            RenamePolicy::Reject
        };
        DiffOptions::for_dialect(dialect).with_rename_policy(rename_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::ForeignKeyPlacement;

    #[test]
    fn test_dialect_resolution() {
        let config = MigrateConfig::default();
        let bare = SchemaSnapshot::new("s");
        assert!(matches!(
            config.resolve_dialect(&bare),
            Err(MigrateError::MissingDialect)
        ));

        let declared = SchemaSnapshot::new("s").with_provider(DialectKind::Sqlite);
        assert_eq!(config.resolve_dialect(&declared).unwrap(), DialectKind::Sqlite);

        let config = MigrateConfig {
            dialect: Some(DialectKind::Mysql),
            ..MigrateConfig::default()
        };
        assert_eq!(config.resolve_dialect(&declared).unwrap(), DialectKind::Mysql);
    }

    #[test]
    fn test_diff_options() {
        let config = MigrateConfig {
            allow_drop_add: true,
            ..MigrateConfig::default()
        };
        let options = config.diff_options(DialectKind::Sqlite);
        assert_eq!(options.rename_policy, RenamePolicy::DropAndAdd);
        assert_eq!(options.foreign_keys, ForeignKeyPlacement::Inline);
        assert_eq!(
            MigrateConfig::default()
                .diff_options(DialectKind::Postgres)
                .rename_policy,
            RenamePolicy::Reject
        );
    }
}
