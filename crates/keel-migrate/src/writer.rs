//! Planning and writing migrations.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use keel_core::{Change, DialectKind, DiffOptions, Differ, SchemaDiff, SchemaSnapshot, StatementGenerator};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::history::{MIGRATION_FILE, SNAPSHOT_FILE, TIMESTAMP_FORMAT};

/// A verified migration, ready to be written.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Changes and warnings.
    pub diff: SchemaDiff,
    /// Rendered `migration.sql`.
    pub sql: String,
    /// Schema after the migration, with its provider set to the target
    /// dialect.
    pub snapshot: SchemaSnapshot,
}

impl MigrationPlan {
    /// Returns `true` if there is nothing to migrate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diff.is_empty()
    }
}

/// Plans migrations for one dialect and writes them to disk.
#[derive(Debug, Clone, Copy)]
pub struct MigrationWriter {
    dialect: DialectKind,
    differ: Differ,
}

impl MigrationWriter {
    /// Creates a writer for `dialect`.
    #[must_use]
    pub const fn new(dialect: DialectKind, options: DiffOptions) -> Self {
        Self {
            dialect,
            differ: Differ::new(options),
        }
    }

    /// Plans the migration from `before` to `after`.
    ///
    /// The changes are replayed on `before` and must reproduce `after`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ProviderMismatch`] if `before` was written
    /// for another dialect, [`MigrateError::PlanMismatch`] if the replay
    /// fails, or the diff or SQL generation error.
    pub fn plan(&self, before: &SchemaSnapshot, after: &SchemaSnapshot) -> Result<MigrationPlan> {
        if let Some(recorded) = before.provider {
            if recorded != self.dialect {
                return Err(MigrateError::ProviderMismatch {
                    recorded,
                    requested: self.dialect,
                });
            }
        }

        let diff = self.differ.diff(before, after)?;
        for warning in &diff.warnings {
            warn!("{warning}");
        }

        let mut replayed = before.clone();
        if let Err(err) = replayed.apply_all(&diff.changes) {
            debug!(%err, "replay failed");
            return Err(MigrateError::PlanMismatch(after.name.clone()));
        }
        if !replayed.structurally_eq(after) {
            return Err(MigrateError::PlanMismatch(after.name.clone()));
        }

        let sql = render(self.dialect, &diff.changes)?;
        let mut snapshot = after.clone();
        snapshot.provider = Some(self.dialect);
        Ok(MigrationPlan {
            diff,
            sql,
            snapshot,
        })
    }

    /// Writes `plan` to `<dir>/<timestamp>_<name>/` and returns the
    /// migration directory.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationExists`] if the directory already
    /// exists, or an IO or serialization error.
    pub fn write(
        &self,
        dir: &Path,
        name: &str,
        created_at: NaiveDateTime,
        plan: &MigrationPlan,
    ) -> Result<PathBuf> {
        let id = format!(
            "{}_{}",
            created_at.format(TIMESTAMP_FORMAT),
            sanitize_name(name)
        );
        let path = dir.join(&id);
        if path.exists() {
            return Err(MigrateError::MigrationExists(path));
        }

        // Files are written to a staging directory first, so a migration
        // directory always holds both files.
        let staging = dir.join(format!(".{id}.tmp"));
        if staging.is_dir() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        if let Err(err) = Self::write_files(&staging, plan) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), %cleanup, "failed to remove staging directory");
            }
            return Err(err);
        }
        fs::rename(&staging, &path)?;
        info!(
            migration = %id,
            changes = plan.diff.changes.len(),
            dialect = %self.dialect,
            "created migration"
        );
        Ok(path)
    }

    fn write_files(dir: &Path, plan: &MigrationPlan) -> Result<()> {
        fs::write(dir.join(MIGRATION_FILE), &plan.sql)?;
        fs::write(
            dir.join(SNAPSHOT_FILE),
            serde_json::to_string_pretty(&plan.snapshot)?,
        )?;
        Ok(())
    }
}

/// Renders changes as a migration script: a `-- <Kind>` header per
/// change followed by its statements, each terminated with `;`.
///
/// # Errors
///
/// Returns [`keel_core::Error::UnsupportedFeature`] if the dialect cannot
/// express a change.
pub fn render(dialect: DialectKind, changes: &[Change]) -> Result<String> {
    let grouped = StatementGenerator::for_kind(dialect).generate_grouped(changes)?;
    let mut sql = String::new();
    for (i, (change, statements)) in grouped.iter().enumerate() {
        if i > 0 {
            sql.push('\n');
        }
        let _ = writeln!(sql, "-- {}", change.kind());
        for statement in statements {
            let _ = writeln!(sql, "{statement};");
        }
    }
    Ok(sql)
}

/// Turns a migration name into `[a-z0-9_]`, collapsing runs of other
/// characters into one underscore.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
        } else if !sanitized.is_empty() && !sanitized.ends_with('_') {
            sanitized.push('_');
        }
    }
    let trimmed = sanitized.trim_end_matches('_');
    if trimmed.is_empty() {
        "migration".to_string()
    } else {
        trimmed.to_string()
    }
}
