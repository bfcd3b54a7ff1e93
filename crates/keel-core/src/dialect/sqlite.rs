//! SQLite dialect.

use super::{Dialect, DialectKind};
use crate::change::{AddColumnOp, AddConstraintOp, AlterColumnOp, DropConstraintOp};
use crate::error::Result;
use crate::schema::{Column, Constraint, DataType, DefaultValue, Table};

/// SQLite dialect for migration SQL generation.
///
/// SQLite has limited ALTER TABLE support: columns cannot be altered and
/// primary or foreign keys cannot be added to or dropped from existing
/// tables. Those changes are reported as unsupported rather than emitted
/// as table rebuilds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the column carrying `AUTOINCREMENT`, if the primary key of
    /// `table` is a single autoincrement column.
    fn rowid_column(table: &Table) -> Option<&str> {
        match table.primary_key()?.columns() {
            [column] if table.column(column).is_some_and(Column::is_autoincrement) => {
                Some(column.as_str())
            }
            _ => None,
        }
    }
}

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn map_data_type(&self, data_type: &DataType) -> Result<String> {
        Ok(match data_type {
            DataType::SmallInt | DataType::Integer | DataType::BigInt => "INTEGER".to_string(),
            DataType::Real | DataType::Double => "REAL".to_string(),
            DataType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            DataType::String
            | DataType::Text
            | DataType::Char(_)
            | DataType::VarChar(_)
            | DataType::Uuid => "TEXT".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Date | DataType::Time | DataType::Timestamp(_) => "DATETIME".to_string(),
            DataType::Bytes => "BLOB".to_string(),
            DataType::Json | DataType::TimestampTz(_) => {
                return Err(self.unsupported(&format!("the {data_type} type")));
            }
        })
    }

    fn inline_primary_key(&self, table: &Table) -> bool {
        Self::rowid_column(table).is_some()
    }

    fn table_column_definition(&self, table: &Table, column: &Column) -> Result<String> {
        if !column.is_autoincrement() {
            return self.column_definition(column);
        }
        if column.data_type != DataType::Integer {
            return Err(self.unsupported(&format!(
                "autoincrement on {} column `{}.{}`",
                column.data_type, table.name, column.name
            )));
        }
        if Self::rowid_column(table) != Some(column.name.as_str()) {
            return Err(self.unsupported(&format!(
                "autoincrement on `{}.{}`, which is not the single-column primary key",
                table.name, column.name
            )));
        }
        Ok(format!(
            "{} INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT",
            self.quote_identifier(&column.name)
        ))
    }

    fn add_column(&self, op: &AddColumnOp) -> Result<Vec<String>> {
        let column = &op.column;
        let qualified = format!("{}.{}", op.table, column.name);
        match &column.default {
            Some(DefaultValue::Autoincrement) => {
                return Err(self.unsupported(&format!(
                    "adding autoincrement column `{qualified}` to an existing table"
                )));
            }
            // ADD COLUMN only accepts constant defaults.
            Some(DefaultValue::Expression(_)) => {
                return Err(self.unsupported(&format!(
                    "adding column `{qualified}` with an expression default"
                )));
            }
            None if !column.nullable => {
                return Err(self.unsupported(&format!(
                    "adding required column `{qualified}` without a default"
                )));
            }
            _ => {}
        }
        Ok(vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(&op.table),
            self.column_definition(column)?
        )])
    }

    fn alter_column(&self, op: &AlterColumnOp) -> Result<Vec<String>> {
        Err(self.unsupported(&format!(
            "altering column `{}.{}`",
            op.table,
            op.column()
        )))
    }

    fn add_constraint(&self, op: &AddConstraintOp) -> Result<Vec<String>> {
        match &op.constraint {
            Constraint::Unique { .. } | Constraint::Index { .. } => {
                Ok(vec![self.create_index(&op.table, &op.constraint)])
            }
            constraint => Err(self.unsupported(&format!(
                "adding {} `{}` to existing table `{}`",
                constraint.kind_label(),
                constraint.name(),
                op.table
            ))),
        }
    }

    fn drop_constraint(&self, op: &DropConstraintOp) -> Result<Vec<String>> {
        match &op.constraint {
            Constraint::Unique { name, .. } | Constraint::Index { name, .. } => {
                Ok(vec![self.drop_index(&op.table, name)])
            }
            constraint => Err(self.unsupported(&format!(
                "dropping {} `{}` from table `{}`",
                constraint.kind_label(),
                constraint.name(),
                op.table
            ))),
        }
    }
}
