//! Replaying changes on a snapshot.
//!
//! Applying a change list to a copy of the "before" snapshot must
//! reproduce the "after" snapshot; the migrate tool relies on this to
//! verify a plan before writing it, and the differ tests use it to check
//! their output.

use crate::change::Change;
use crate::error::{Error, Result};
use crate::schema::{SchemaSnapshot, Table};

impl SchemaSnapshot {
    /// Applies a single change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the change does not apply to
    /// the current state (missing table, duplicate column, ...).
    pub fn apply(&mut self, change: &Change) -> Result<()> {
        match change {
            Change::AddTable(op) => {
                if self.table(&op.table.name).is_some() {
                    return Err(Error::InvalidState(format!(
                        "Table '{}' already exists",
                        op.table.name
                    )));
                }
                self.tables.push(op.table.clone());
            }

            Change::DropTable(op) => {
                let idx = self
                    .tables
                    .iter()
                    .position(|t| t.name == op.table.name)
                    .ok_or_else(|| missing_table(&op.table.name))?;
                self.tables.remove(idx);
            }

            Change::AddColumn(op) => {
                let table = self.existing_table(&op.table)?;
                if table.column(&op.column.name).is_some() {
                    return Err(Error::InvalidState(format!(
                        "Column '{}' already exists in table '{}'",
                        op.column.name, op.table
                    )));
                }
                table.columns.push(op.column.clone());
            }

            Change::DropColumn(op) => {
                let table = self.existing_table(&op.table)?;
                let idx = table
                    .columns
                    .iter()
                    .position(|c| c.name == op.column.name)
                    .ok_or_else(|| missing_column(&op.table, &op.column.name))?;
                if let Some(constraint) = table
                    .constraints
                    .values()
                    .find(|c| c.columns().contains(&op.column.name))
                {
                    return Err(Error::InvalidState(format!(
                        "Column '{}' of table '{}' is still used by {} '{}'",
                        op.column.name,
                        op.table,
                        constraint.kind_label(),
                        constraint.name()
                    )));
                }
                table.columns.remove(idx);
            }

            Change::AlterColumn(op) => {
                let table = self.existing_table(&op.table)?;
                let column = table
                    .column_mut(&op.from.name)
                    .ok_or_else(|| missing_column(&op.table, &op.from.name))?;
                if *column != op.from {
                    return Err(Error::InvalidState(format!(
                        "Column '{}' of table '{}' does not match the altered definition",
                        op.from.name, op.table
                    )));
                }
                *column = op.to.clone();
            }

            Change::AddConstraint(op) => {
                if let Some(referenced) = op.constraint.referenced_table() {
                    if referenced != op.table && self.table(referenced).is_none() {
                        return Err(missing_table(referenced));
                    }
                }
                let table = self.existing_table(&op.table)?;
                let name = op.constraint.name();
                if table.constraints.contains_key(name) {
                    return Err(Error::InvalidState(format!(
                        "Constraint '{name}' already exists in table '{}'",
                        op.table
                    )));
                }
                if op.constraint.is_primary_key() && table.primary_key().is_some() {
                    return Err(Error::InvalidState(format!(
                        "Table '{}' already has a primary key",
                        op.table
                    )));
                }
                if let Some(column) = op
                    .constraint
                    .columns()
                    .iter()
                    .find(|c| table.column(c).is_none())
                {
                    return Err(missing_column(&op.table, column));
                }
                table
                    .constraints
                    .insert(name.to_string(), op.constraint.clone());
            }

            Change::DropConstraint(op) => {
                let table = self.existing_table(&op.table)?;
                let name = op.constraint.name();
                if table.constraints.remove(name).is_none() {
                    return Err(Error::InvalidState(format!(
                        "Constraint '{name}' does not exist in table '{}'",
                        op.table
                    )));
                }
            }
        }
        Ok(())
    }

    /// Applies changes in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the error of the first change that does not apply.
    pub fn apply_all<'c>(&mut self, changes: impl IntoIterator<Item = &'c Change>) -> Result<()> {
        for change in changes {
            self.apply(change)?;
        }
        Ok(())
    }

    fn existing_table(&mut self, name: &str) -> Result<&mut Table> {
        self.table_mut(name).ok_or_else(|| missing_table(name))
    }
}

fn missing_table(name: &str) -> Error {
    Error::InvalidState(format!("Table '{name}' does not exist"))
}

fn missing_column(table: &str, column: &str) -> Error {
    Error::InvalidState(format!(
        "Column '{column}' does not exist in table '{table}'"
    ))
}
