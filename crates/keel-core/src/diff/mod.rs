//! Schema differ.
//!
//! Compares a "before" and an "after" [`SchemaSnapshot`] and produces
//! the ordered [`Change`] list that turns one into the other.
//!
//! Changes are emitted in phases so that every intermediate state is
//! valid:
//!
//! 1. new tables (foreign keys deferred to phase 5 unless placed inline);
//! 2. dropped tables, referencing tables before referenced ones, after
//!    dropping the foreign keys surviving tables hold on them;
//! 3. added columns;
//! 4. altered columns, preceded by the drop of a primary key whose
//!    columns become nullable;
//! 5. constraint additions: replaced constraints as adjacent drop/add
//!    pairs, then primary keys, unique constraints, indexes and foreign
//!    keys;
//! 6. constraint removals: foreign keys, unique constraints and indexes,
//!    primary keys;
//! 7. dropped columns.
//!
//! Primary keys are matched by kind (a table has at most one), every
//! other constraint by name.

mod similarity;

use core::fmt;
use std::collections::HashSet;

use tracing::{debug, trace};

use crate::change::Change;
use crate::dialect::{Dialect, DialectKind, StatementGenerator};
use crate::error::{AmbiguousChange, Error, Result};
use crate::schema::{Constraint, DataType, SchemaSnapshot, Table};
use similarity::similarity;

/// Minimum normalized similarity score (0.0–1.0) for a (dropped, added)
/// column pair to be flagged as a possible rename.
const RENAME_SIMILARITY_THRESHOLD: f64 = 0.4;

/// What to do when a drop and an add look like a rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenamePolicy {
    /// Fail with [`Error::DiffConflict`].
    #[default]
    Reject,
    /// Emit the drop and the add.
    DropAndAdd,
}

/// Where foreign keys of new tables are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignKeyPlacement {
    /// As separate `AddConstraint` changes after all tables exist.
    #[default]
    Deferred,
    /// Inside the `AddTable` change.
    Inline,
}

/// Differ options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffOptions {
    /// Rename handling.
    pub rename_policy: RenamePolicy,
    /// Foreign key placement for new tables.
    pub foreign_keys: ForeignKeyPlacement,
}

impl DiffOptions {
    /// Returns the options suited to a dialect.
    ///
    /// SQLite cannot add foreign keys to existing tables, so they stay
    /// inline.
    #[must_use]
    pub const fn for_dialect(kind: DialectKind) -> Self {
        let foreign_keys = match kind {
            DialectKind::Sqlite => ForeignKeyPlacement::Inline,
            DialectKind::Postgres | DialectKind::Mysql => ForeignKeyPlacement::Deferred,
        };
        Self {
            rename_policy: RenamePolicy::Reject,
            foreign_keys,
        }
    }

    /// Sets the rename policy.
    #[must_use]
    pub const fn with_rename_policy(mut self, rename_policy: RenamePolicy) -> Self {
        self.rename_policy = rename_policy;
        self
    }
}

/// A change that may lose data or fail on a populated database.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffWarning {
    /// A table is dropped.
    DroppedTable {
        /// Table name.
        table: String,
    },
    /// A column is dropped.
    DroppedColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A NOT NULL column without default is added to an existing table.
    RequiredColumnAdded {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A nullable column becomes NOT NULL.
    ColumnMadeRequired {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A column's data type changes.
    ColumnTypeChanged {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Old type.
        from: DataType,
        /// New type.
        to: DataType,
    },
    /// A unique constraint is added over existing columns.
    UniqueConstraintAdded {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
    },
    /// The relative order of the columns both snapshots share changed.
    /// Existing tables keep their physical order.
    ColumnOrderChanged {
        /// Table name.
        table: String,
        /// Column names in the old order.
        old_order: Vec<String>,
        /// Column names in the new order.
        new_order: Vec<String>,
    },
}

impl fmt::Display for DiffWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DroppedTable { table } => {
                write!(f, "table `{table}` is dropped, all of its data will be lost")
            }
            Self::DroppedColumn { table, column } => {
                write!(f, "column `{table}.{column}` is dropped, its data will be lost")
            }
            Self::RequiredColumnAdded { table, column } => write!(
                f,
                "required column `{table}.{column}` is added without a default, \
                 this fails if `{table}` is not empty"
            ),
            Self::ColumnMadeRequired { table, column } => write!(
                f,
                "column `{table}.{column}` becomes required, \
                 this fails if it contains NULL values"
            ),
            Self::ColumnTypeChanged {
                table,
                column,
                from,
                to,
            } => write!(
                f,
                "column `{table}.{column}` changes type from {from} to {to}, \
                 existing values may not convert"
            ),
            Self::UniqueConstraintAdded { table, constraint } => write!(
                f,
                "unique constraint `{constraint}` is added to `{table}`, \
                 this fails if existing rows contain duplicates"
            ),
            Self::ColumnOrderChanged { table, .. } => write!(
                f,
                "column order of `{table}` changed, existing columns keep their position"
            ),
        }
    }
}

/// Result of comparing two snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaDiff {
    /// Ordered changes.
    pub changes: Vec<Change>,
    /// Warnings about data loss or changes that may fail.
    pub warnings: Vec<DiffWarning>,
}

impl SchemaDiff {
    /// Returns `true` if there are no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the diff that undoes this one.
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self {
            changes: self.changes.iter().rev().map(Change::reverse).collect(),
            warnings: Vec::new(),
        }
    }

    /// Generates SQL for every change using the given dialect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] if the dialect cannot
    /// express one of the changes.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> Result<Vec<String>> {
        StatementGenerator::new(dialect).generate(&self.changes)
    }
}

/// Compares two snapshots with the default options.
///
/// # Errors
///
/// Returns [`Error::DiffConflict`] when a drop and an add cannot be told
/// apart from a rename.
pub fn diff(before: &SchemaSnapshot, after: &SchemaSnapshot) -> Result<Vec<Change>> {
    Differ::default()
        .diff(before, after)
        .map(|diff| diff.changes)
}

/// Compares snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Differ {
    options: DiffOptions,
}

impl Differ {
    /// Creates a differ with the given options.
    #[must_use]
    pub const fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    /// Returns the differ's options.
    #[must_use]
    pub const fn options(&self) -> DiffOptions {
        self.options
    }

    /// Compares `before` and `after`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiffConflict`] when a drop and an add cannot be
    /// told apart from a rename and the rename policy is
    /// [`RenamePolicy::Reject`].
    pub fn diff(&self, before: &SchemaSnapshot, after: &SchemaSnapshot) -> Result<SchemaDiff> {
        let added: Vec<&Table> = after
            .tables
            .iter()
            .filter(|t| before.table(&t.name).is_none())
            .collect();
        let dropped: Vec<&Table> = before
            .tables
            .iter()
            .filter(|t| after.table(&t.name).is_none())
            .collect();
        let common: Vec<(&Table, &Table)> = after
            .tables
            .iter()
            .filter_map(|new| before.table(&new.name).map(|old| (old, new)))
            .collect();

        if self.options.rename_policy == RenamePolicy::Reject {
            if let Some(conflict) = detect_rename(&dropped, &added, &common) {
                debug!(%conflict, "diff rejected");
                return Err(Error::DiffConflict(conflict));
            }
        }

        let mut diff = SchemaDiff::default();

        // 1. New tables
        let mut deferred = Vec::new();
        for table in &added {
            let mut table = (*table).clone();
            if self.options.foreign_keys == ForeignKeyPlacement::Deferred {
                let foreign_keys: Vec<Constraint> = table.foreign_keys().cloned().collect();
                for fk in foreign_keys {
                    table.constraints.remove(fk.name());
                    deferred.push((table.name.clone(), fk));
                }
            }
            diff.changes.push(Change::add_table(table));
        }

        // 2. Dropped tables
        let released = self.drop_tables(&dropped, &common, &mut diff);

        // 3. New columns
        for (old, new) in &common {
            for column in &new.columns {
                if old.column(&column.name).is_some() {
                    continue;
                }
                if !column.nullable && column.default.is_none() {
                    diff.warnings.push(DiffWarning::RequiredColumnAdded {
                        table: new.name.clone(),
                        column: column.name.clone(),
                    });
                }
                diff.changes
                    .push(Change::add_column(&new.name, column.clone()));
            }
        }

        let plans: Vec<ConstraintPlan<'_>> = common
            .iter()
            .map(|(old, new)| ConstraintPlan::new(old, new, &released))
            .collect();

        // 4. Altered columns. A primary key on its way out is dropped first
        // when one of its columns becomes nullable.
        let early = Self::drop_primary_keys_early(&plans, &mut diff);
        for (old, new) in &common {
            for column in &new.columns {
                let Some(previous) = old.column(&column.name) else {
                    continue;
                };
                if previous == column {
                    continue;
                }
                if previous.nullable && !column.nullable {
                    diff.warnings.push(DiffWarning::ColumnMadeRequired {
                        table: new.name.clone(),
                        column: column.name.clone(),
                    });
                }
                if previous.data_type != column.data_type {
                    diff.warnings.push(DiffWarning::ColumnTypeChanged {
                        table: new.name.clone(),
                        column: column.name.clone(),
                        from: previous.data_type.clone(),
                        to: column.data_type.clone(),
                    });
                }
                diff.changes.push(Change::alter_column(
                    &new.name,
                    previous.clone(),
                    column.clone(),
                ));
            }
            detect_column_order_change(old, new, &mut diff.warnings);
        }

        // 5. and 6. Constraints
        Self::add_constraints(&plans, &after.tables, &deferred, &early, &mut diff);
        Self::remove_constraints(&plans, &early, &mut diff);

        // 7. Dropped columns
        for (old, new) in &common {
            for column in &old.columns {
                if new.column(&column.name).is_some() {
                    continue;
                }
                diff.warnings.push(DiffWarning::DroppedColumn {
                    table: old.name.clone(),
                    column: column.name.clone(),
                });
                diff.changes
                    .push(Change::drop_column(&old.name, column.clone()));
            }
        }

        for change in &diff.changes {
            trace!(kind = change.kind(), table = change.table(), "change");
        }
        debug!(
            before = %before.name,
            after = %after.name,
            changes = diff.changes.len(),
            warnings = diff.warnings.len(),
            "computed schema diff"
        );
        Ok(diff)
    }

    /// Emits the drops for `dropped` tables and returns the foreign keys
    /// of surviving tables that had to be dropped first, as
    /// `(table, constraint)` names.
    fn drop_tables(
        &self,
        dropped: &[&Table],
        common: &[(&Table, &Table)],
        diff: &mut SchemaDiff,
    ) -> HashSet<(String, String)> {
        let dropped_names: HashSet<&str> = dropped.iter().map(|t| t.name.as_str()).collect();

        let mut released = HashSet::new();
        for (old, _) in common {
            for fk in old.foreign_keys() {
                if fk
                    .referenced_table()
                    .is_some_and(|t| dropped_names.contains(t))
                {
                    released.insert((old.name.clone(), fk.name().to_string()));
                    diff.changes
                        .push(Change::drop_constraint(&old.name, fk.clone()));
                }
            }
        }

        let mut remaining: Vec<Table> = dropped.iter().map(|t| (*t).clone()).collect();
        while !remaining.is_empty() {
            let idx = match remaining
                .iter()
                .position(|t| !is_referenced(&t.name, &remaining))
            {
                Some(idx) => idx,
                None => {
                    // Reference cycle: drop the first table, after dropping
                    // the foreign keys the rest of the cycle holds on it.
                    if self.options.foreign_keys == ForeignKeyPlacement::Deferred {
                        let target = remaining[0].name.clone();
                        for table in remaining.iter_mut().skip(1) {
                            let foreign_keys: Vec<Constraint> = table
                                .foreign_keys()
                                .filter(|fk| fk.referenced_table() == Some(target.as_str()))
                                .cloned()
                                .collect();
                            for fk in foreign_keys {
                                table.constraints.remove(fk.name());
                                diff.changes.push(Change::drop_constraint(&table.name, fk));
                            }
                        }
                    }
                    0
                }
            };
            let table = remaining.remove(idx);
            diff.warnings.push(DiffWarning::DroppedTable {
                table: table.name.clone(),
            });
            diff.changes.push(Change::drop_table(table));
        }

        released
    }

    /// Drops the primary keys that would keep a column from becoming
    /// nullable, together with the foreign keys going away that reference
    /// their tables. Returns the dropped `(table, constraint)` names.
    fn drop_primary_keys_early(
        plans: &[ConstraintPlan<'_>],
        diff: &mut SchemaDiff,
    ) -> HashSet<(String, String)> {
        let mut early = HashSet::new();
        for plan in plans {
            let Some(pk) = plan.primary_key_blocking_alter() else {
                continue;
            };
            for other in plans {
                for fk in other.outgoing().filter(|c| {
                    c.is_foreign_key() && c.referenced_table() == Some(plan.table)
                }) {
                    if early.insert((other.table.to_string(), fk.name().to_string())) {
                        diff.changes
                            .push(Change::drop_constraint(other.table, fk.clone()));
                    }
                }
            }
            early.insert((plan.table.to_string(), pk.name().to_string()));
            diff.changes
                .push(Change::drop_constraint(plan.table, pk.clone()));
        }
        early
    }

    fn add_constraints(
        plans: &[ConstraintPlan<'_>],
        tables: &[Table],
        deferred: &[(String, Constraint)],
        early: &HashSet<(String, String)>,
        diff: &mut SchemaDiff,
    ) {
        for plan in plans {
            for (old, new) in &plan.replaced {
                if !early.contains(&(plan.table.to_string(), old.name().to_string())) {
                    diff.changes
                        .push(Change::drop_constraint(plan.table, (*old).clone()));
                }
                if matches!(new, Constraint::Unique { .. }) {
                    plan.warn_unique(new, &mut diff.warnings);
                }
                diff.changes
                    .push(Change::add_constraint(plan.table, (*new).clone()));
            }
        }

        let groups: [fn(&Constraint) -> bool; 3] = [
            Constraint::is_primary_key,
            |c| matches!(c, Constraint::Unique { .. }),
            |c| matches!(c, Constraint::Index { .. }),
        ];
        for group in groups {
            for plan in plans {
                for constraint in plan.added.iter().filter(|c| group(c)) {
                    if matches!(constraint, Constraint::Unique { .. }) {
                        plan.warn_unique(constraint, &mut diff.warnings);
                    }
                    diff.changes
                        .push(Change::add_constraint(plan.table, (*constraint).clone()));
                }
            }
        }

        // Foreign keys last, in "after" table order, so everything they
        // reference exists.
        for table in tables {
            for (_, fk) in deferred.iter().filter(|(t, _)| t == &table.name) {
                diff.changes
                    .push(Change::add_constraint(&table.name, fk.clone()));
            }
            let Some(plan) = plans.iter().find(|p| p.table == table.name) else {
                continue;
            };
            for fk in plan.added.iter().filter(|c| c.is_foreign_key()) {
                diff.changes
                    .push(Change::add_constraint(plan.table, (*fk).clone()));
            }
        }
    }

    fn remove_constraints(
        plans: &[ConstraintPlan<'_>],
        early: &HashSet<(String, String)>,
        diff: &mut SchemaDiff,
    ) {
        let groups: [fn(&Constraint) -> bool; 3] = [
            Constraint::is_foreign_key,
            |c| matches!(c, Constraint::Unique { .. } | Constraint::Index { .. }),
            Constraint::is_primary_key,
        ];
        for group in groups {
            for plan in plans {
                for constraint in plan
                    .removed
                    .iter()
                    .filter(|c| {
                        group(c) && !early.contains(&(plan.table.to_string(), c.name().to_string()))
                    })
                {
                    diff.changes
                        .push(Change::drop_constraint(plan.table, (*constraint).clone()));
                }
            }
        }
    }
}

/// Per-table constraint differences.
struct ConstraintPlan<'a> {
    table: &'a str,
    old: &'a Table,
    new: &'a Table,
    replaced: Vec<(&'a Constraint, &'a Constraint)>,
    added: Vec<&'a Constraint>,
    removed: Vec<&'a Constraint>,
}

impl<'a> ConstraintPlan<'a> {
    fn new(old: &'a Table, new: &'a Table, released: &HashSet<(String, String)>) -> Self {
        let existing: Vec<&Constraint> = old
            .constraints
            .values()
            .filter(|c| !released.contains(&(old.name.clone(), c.name().to_string())))
            .collect();
        let old_pk = existing.iter().copied().find(|c| c.is_primary_key());

        let mut plan = Self {
            table: &new.name,
            old,
            new,
            replaced: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
        };
        let mut matched: HashSet<&str> = HashSet::new();
        // The old primary key belongs to the new one, whatever its name.
        if let (Some(previous), Some(_)) = (old_pk, new.primary_key()) {
            matched.insert(previous.name());
        }

        for constraint in new.constraints.values() {
            let counterpart = if constraint.is_primary_key() {
                old_pk
            } else {
                existing.iter().copied().find(|c| {
                    !c.is_primary_key()
                        && c.name() == constraint.name()
                        && !matched.contains(c.name())
                })
            };
            // A constraint of another kind may hold the name.
            let counterpart = counterpart.or_else(|| {
                existing
                    .iter()
                    .copied()
                    .find(|c| c.name() == constraint.name() && !matched.contains(c.name()))
            });

            match counterpart {
                Some(previous) => {
                    matched.insert(previous.name());
                    if previous != constraint {
                        plan.replaced.push((previous, constraint));
                    }
                }
                None => plan.added.push(constraint),
            }
        }

        plan.removed = existing
            .into_iter()
            .filter(|c| !matched.contains(c.name()))
            .collect();
        plan
    }

    /// Old constraints that are dropped, on their own or as half of a
    /// replaced pair.
    fn outgoing(&self) -> impl Iterator<Item = &'a Constraint> + '_ {
        self.removed
            .iter()
            .copied()
            .chain(self.replaced.iter().map(|(old, _)| *old))
    }

    /// Returns the old primary key if it is dropped and one of its columns
    /// becomes nullable.
    fn primary_key_blocking_alter(&self) -> Option<&'a Constraint> {
        let pk = self.outgoing().find(|c| c.is_primary_key())?;
        pk.columns()
            .iter()
            .any(|name| {
                matches!(
                    (self.old.column(name), self.new.column(name)),
                    (Some(before), Some(after)) if !before.nullable && after.nullable
                )
            })
            .then_some(pk)
    }

    fn warn_unique(&self, constraint: &Constraint, warnings: &mut Vec<DiffWarning>) {
        if constraint
            .columns()
            .iter()
            .any(|c| self.old.column(c).is_some())
        {
            warnings.push(DiffWarning::UniqueConstraintAdded {
                table: self.table.to_string(),
                constraint: constraint.name().to_string(),
            });
        }
    }
}

fn is_referenced(name: &str, tables: &[Table]) -> bool {
    tables.iter().any(|t| {
        t.name != name
            && t
                .foreign_keys()
                .any(|fk| fk.referenced_table() == Some(name))
    })
}

/// Finds the most likely rename among the dropped and added tables, or
/// else among the dropped and added columns of surviving tables.
fn detect_rename(
    dropped: &[&Table],
    added: &[&Table],
    common: &[(&Table, &Table)],
) -> Option<AmbiguousChange> {
    let mut best: Option<(f64, AmbiguousChange)> = None;

    for old in dropped {
        for new in added {
            if old.same_columns(new) {
                let score = similarity(&old.name, &new.name);
                keep_best(
                    &mut best,
                    score,
                    AmbiguousChange::PossibleTableRename {
                        old_table: old.name.clone(),
                        new_table: new.name.clone(),
                        similarity: score,
                    },
                );
            }
        }
    }
    if best.is_some() {
        return best.map(|(_, change)| change);
    }

    for (old, new) in common {
        for previous in old.columns.iter().filter(|c| new.column(&c.name).is_none()) {
            for column in new.columns.iter().filter(|c| old.column(&c.name).is_none()) {
                if !previous.same_definition(column) {
                    continue;
                }
                let score = similarity(&previous.name, &column.name);
                if score >= RENAME_SIMILARITY_THRESHOLD {
                    keep_best(
                        &mut best,
                        score,
                        AmbiguousChange::PossibleRename {
                            table: new.name.clone(),
                            old_column: previous.name.clone(),
                            new_column: column.name.clone(),
                            similarity: score,
                        },
                    );
                }
            }
        }
    }
    best.map(|(_, change)| change)
}

fn keep_best(best: &mut Option<(f64, AmbiguousChange)>, score: f64, change: AmbiguousChange) {
    if best.as_ref().map_or(true, |(current, _)| score > *current) {
        *best = Some((score, change));
    }
}

/// Warns when the relative order of the columns both tables share
/// changed.
fn detect_column_order_change(old: &Table, new: &Table, warnings: &mut Vec<DiffWarning>) {
    let old_order: Vec<String> = old
        .columns
        .iter()
        .filter(|c| new.column(&c.name).is_some())
        .map(|c| c.name.clone())
        .collect();
    let new_order: Vec<String> = new
        .columns
        .iter()
        .filter(|c| old.column(&c.name).is_some())
        .map(|c| c.name.clone())
        .collect();

    if old_order != new_order {
        warnings.push(DiffWarning::ColumnOrderChanged {
            table: new.name.clone(),
            old_order,
            new_order,
        });
    }
}
