//! Schema snapshot types.
//!
//! A [`SchemaSnapshot`] is a point-in-time description of a database
//! schema. The loader produces one from a schema file, the migrate tool
//! persists them as JSON, and the differ compares two of them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::types::{DataType, DefaultValue, ReferentialAction};
use crate::dialect::DialectKind;

/// A single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub data_type: DataType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default value, if any.
    pub default: Option<DefaultValue>,
}

impl Column {
    /// Creates a nullable column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Returns `true` if the column's value comes from a sequence.
    #[must_use]
    pub fn is_autoincrement(&self) -> bool {
        matches!(self.default, Some(DefaultValue::Autoincrement))
    }

    /// Returns `true` if both columns have the same definition,
    /// ignoring their names.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.nullable == other.nullable
            && self.default == other.default
    }
}

/// A table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    /// Primary key.
    PrimaryKey {
        /// Constraint name.
        name: String,
        /// Key columns.
        columns: Vec<String>,
    },
    /// Unique constraint.
    Unique {
        /// Constraint name.
        name: String,
        /// Constrained columns.
        columns: Vec<String>,
    },
    /// Non-unique index.
    Index {
        /// Index name.
        name: String,
        /// Indexed columns.
        columns: Vec<String>,
    },
    /// Foreign key.
    ForeignKey {
        /// Constraint name.
        name: String,
        /// Referencing columns in this table.
        columns: Vec<String>,
        /// Referenced table.
        referenced_table: String,
        /// Referenced columns.
        referenced_columns: Vec<String>,
        /// ON DELETE action.
        on_delete: ReferentialAction,
        /// ON UPDATE action.
        on_update: ReferentialAction,
    },
}

impl Constraint {
    /// Returns the constraint name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::PrimaryKey { name, .. }
            | Self::Unique { name, .. }
            | Self::Index { name, .. }
            | Self::ForeignKey { name, .. } => name,
        }
    }

    /// Returns the columns of this table the constraint covers.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        match self {
            Self::PrimaryKey { columns, .. }
            | Self::Unique { columns, .. }
            | Self::Index { columns, .. }
            | Self::ForeignKey { columns, .. } => columns,
        }
    }

    /// Returns the referenced table for foreign keys.
    #[must_use]
    pub fn referenced_table(&self) -> Option<&str> {
        match self {
            Self::ForeignKey {
                referenced_table, ..
            } => Some(referenced_table),
            _ => None,
        }
    }

    /// Returns `true` for primary keys.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        matches!(self, Self::PrimaryKey { .. })
    }

    /// Returns `true` for foreign keys.
    #[must_use]
    pub const fn is_foreign_key(&self) -> bool {
        matches!(self, Self::ForeignKey { .. })
    }

    /// Returns a short label for the constraint kind.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::PrimaryKey { .. } => "primary key",
            Self::Unique { .. } => "unique constraint",
            Self::Index { .. } => "index",
            Self::ForeignKey { .. } => "foreign key",
        }
    }
}

/// A table: ordered columns plus a set of constraints keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Constraints keyed by name.
    pub constraints: BTreeMap<String, Constraint>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: BTreeMap::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints
            .insert(constraint.name().to_string(), constraint);
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column by name, mutably.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns the primary key constraint, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints.values().find(|c| c.is_primary_key())
    }

    /// Iterates over foreign key constraints.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values().filter(|c| c.is_foreign_key())
    }

    /// Returns `true` if both tables have identical columns in the same
    /// order, ignoring table names and constraints.
    #[must_use]
    pub fn same_columns(&self, other: &Self) -> bool {
        self.columns == other.columns
    }

    fn structurally_eq(&self, other: &Self) -> bool {
        if self.columns.len() != other.columns.len() || self.constraints != other.constraints {
            return false;
        }
        self.columns
            .iter()
            .all(|c| other.column(&c.name).is_some_and(|o| o == c))
    }
}

/// A named snapshot of an entire schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Snapshot name (usually the schema file stem).
    pub name: String,
    /// The provider declared by the schema's datasource, if any.
    pub provider: Option<DialectKind>,
    /// Tables in declaration order.
    pub tables: Vec<Table>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: None,
            tables: Vec::new(),
        }
    }

    /// Sets the provider.
    #[must_use]
    pub const fn with_provider(mut self, provider: DialectKind) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Appends a table.
    #[must_use]
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Looks up a table by name, mutably.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Returns `true` if the snapshot has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Compares table, column and constraint sets, ignoring declaration
    /// order, snapshot names and providers.
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        let names: BTreeSet<&str> = self.tables.iter().map(|t| t.name.as_str()).collect();
        let other_names: BTreeSet<&str> = other.tables.iter().map(|t| t.name.as_str()).collect();
        if names != other_names || self.tables.len() != other.tables.len() {
            return false;
        }
        self.tables.iter().all(|t| {
            other
                .table(&t.name)
                .is_some_and(|o| t.structurally_eq(o))
        })
    }
}
