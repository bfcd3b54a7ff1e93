//! Schema changes.
//!
//! A [`Change`] is a single structural difference between two schema
//! snapshots. Every change carries the full definitions it touches, so
//! it can be turned into SQL without consulting either snapshot and it
//! can always be reversed.

use serde::{Deserialize, Serialize};

use crate::schema::{Column, Constraint, DataType, DefaultValue, Table};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    /// Create a table.
    AddTable(AddTableOp),
    /// Drop a table.
    DropTable(DropTableOp),
    /// Add a column to an existing table.
    AddColumn(AddColumnOp),
    /// Drop a column from a table.
    DropColumn(DropColumnOp),
    /// Change a column's type, nullability or default.
    AlterColumn(AlterColumnOp),
    /// Add a primary key, unique constraint, index or foreign key.
    AddConstraint(AddConstraintOp),
    /// Drop a primary key, unique constraint, index or foreign key.
    DropConstraint(DropConstraintOp),
}

impl Change {
    /// Creates an add table change.
    #[must_use]
    pub const fn add_table(table: Table) -> Self {
        Self::AddTable(AddTableOp { table })
    }

    /// Creates a drop table change.
    #[must_use]
    pub const fn drop_table(table: Table) -> Self {
        Self::DropTable(DropTableOp { table })
    }

    /// Creates an add column change.
    #[must_use]
    pub fn add_column(table: impl Into<String>, column: Column) -> Self {
        Self::AddColumn(AddColumnOp {
            table: table.into(),
            column,
        })
    }

    /// Creates a drop column change.
    #[must_use]
    pub fn drop_column(table: impl Into<String>, column: Column) -> Self {
        Self::DropColumn(DropColumnOp {
            table: table.into(),
            column,
        })
    }

    /// Creates an alter column change from the old and new definitions.
    #[must_use]
    pub fn alter_column(table: impl Into<String>, from: Column, to: Column) -> Self {
        Self::AlterColumn(AlterColumnOp {
            table: table.into(),
            from,
            to,
        })
    }

    /// Creates an add constraint change.
    #[must_use]
    pub fn add_constraint(table: impl Into<String>, constraint: Constraint) -> Self {
        Self::AddConstraint(AddConstraintOp {
            table: table.into(),
            constraint,
        })
    }

    /// Creates a drop constraint change.
    #[must_use]
    pub fn drop_constraint(table: impl Into<String>, constraint: Constraint) -> Self {
        Self::DropConstraint(DropConstraintOp {
            table: table.into(),
            constraint,
        })
    }

    /// Returns the name of the table the change applies to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::AddTable(op) => &op.table.name,
            Self::DropTable(op) => &op.table.name,
            Self::AddColumn(op) => &op.table,
            Self::DropColumn(op) => &op.table,
            Self::AlterColumn(op) => &op.table,
            Self::AddConstraint(op) => &op.table,
            Self::DropConstraint(op) => &op.table,
        }
    }

    /// Returns a short label for the change, used as the comment
    /// header in migration files.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AddTable(_) => "CreateTable",
            Self::DropTable(_) => "DropTable",
            Self::AddColumn(_) => "AddColumn",
            Self::DropColumn(_) => "DropColumn",
            Self::AlterColumn(_) => "AlterColumn",
            Self::AddConstraint(op) => match op.constraint {
                Constraint::PrimaryKey { .. } => "AddPrimaryKey",
                Constraint::Unique { .. } => "CreateUniqueIndex",
                Constraint::Index { .. } => "CreateIndex",
                Constraint::ForeignKey { .. } => "AddForeignKey",
            },
            Self::DropConstraint(op) => match op.constraint {
                Constraint::PrimaryKey { .. } => "DropPrimaryKey",
                Constraint::Unique { .. } | Constraint::Index { .. } => "DropIndex",
                Constraint::ForeignKey { .. } => "DropForeignKey",
            },
        }
    }

    /// Returns the change that undoes this one.
    #[must_use]
    pub fn reverse(&self) -> Self {
        match self {
            Self::AddTable(op) => Self::drop_table(op.table.clone()),
            Self::DropTable(op) => Self::add_table(op.table.clone()),
            Self::AddColumn(op) => Self::drop_column(&op.table, op.column.clone()),
            Self::DropColumn(op) => Self::add_column(&op.table, op.column.clone()),
            Self::AlterColumn(op) => {
                Self::alter_column(&op.table, op.to.clone(), op.from.clone())
            }
            Self::AddConstraint(op) => Self::drop_constraint(&op.table, op.constraint.clone()),
            Self::DropConstraint(op) => Self::add_constraint(&op.table, op.constraint.clone()),
        }
    }

    /// Returns `true` if applying the change can lose data.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::DropTable(_) | Self::DropColumn(_))
    }
}

/// Add table operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddTableOp {
    /// The table to create, including its constraints.
    pub table: Table,
}

impl From<AddTableOp> for Change {
    fn from(op: AddTableOp) -> Self {
        Self::AddTable(op)
    }
}

/// Drop table operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTableOp {
    /// The table as it exists right before the drop.
    pub table: Table,
}

impl From<DropTableOp> for Change {
    fn from(op: DropTableOp) -> Self {
        Self::DropTable(op)
    }
}

/// Add column operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddColumnOp {
    /// Table name.
    pub table: String,
    /// Column definition.
    pub column: Column,
}

impl From<AddColumnOp> for Change {
    fn from(op: AddColumnOp) -> Self {
        Self::AddColumn(op)
    }
}

/// Drop column operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropColumnOp {
    /// Table name.
    pub table: String,
    /// Definition of the dropped column.
    pub column: Column,
}

impl From<DropColumnOp> for Change {
    fn from(op: DropColumnOp) -> Self {
        Self::DropColumn(op)
    }
}

/// A single alteration within an [`AlterColumnOp`].
#[derive(Debug, Clone, PartialEq)]
pub enum AlterColumnChange {
    /// Change the data type.
    SetDataType(DataType),
    /// Set or remove NOT NULL.
    SetNullable(bool),
    /// Set a new default value.
    SetDefault(DefaultValue),
    /// Remove the default value.
    DropDefault,
}

/// Alter column operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterColumnOp {
    /// Table name.
    pub table: String,
    /// Column definition before the change.
    pub from: Column,
    /// Column definition after the change.
    pub to: Column,
}

impl AlterColumnOp {
    /// Returns the column name.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.to.name
    }

    /// Lists the individual alterations, in type, nullability, default
    /// order.
    #[must_use]
    pub fn alterations(&self) -> Vec<AlterColumnChange> {
        let mut changes = Vec::new();
        if self.from.data_type != self.to.data_type {
            changes.push(AlterColumnChange::SetDataType(self.to.data_type.clone()));
        }
        if self.from.nullable != self.to.nullable {
            changes.push(AlterColumnChange::SetNullable(self.to.nullable));
        }
        match (&self.from.default, &self.to.default) {
            (_, Some(new)) if self.from.default.as_ref() != Some(new) => {
                changes.push(AlterColumnChange::SetDefault(new.clone()));
            }
            (Some(_), None) => changes.push(AlterColumnChange::DropDefault),
            _ => {}
        }
        changes
    }
}

impl From<AlterColumnOp> for Change {
    fn from(op: AlterColumnOp) -> Self {
        Self::AlterColumn(op)
    }
}

/// Add constraint operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddConstraintOp {
    /// Table name.
    pub table: String,
    /// The constraint to add.
    pub constraint: Constraint,
}

impl From<AddConstraintOp> for Change {
    fn from(op: AddConstraintOp) -> Self {
        Self::AddConstraint(op)
    }
}

/// Drop constraint operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropConstraintOp {
    /// Table name.
    pub table: String,
    /// The constraint being dropped.
    pub constraint: Constraint,
}

impl From<DropConstraintOp> for Change {
    fn from(op: DropConstraintOp) -> Self {
        Self::DropConstraint(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Column {
        Column::new("email", DataType::VarChar(100))
    }

    #[test]
    fn test_reverse_round_trip() {
        let changes = vec![
            Change::add_table(Table::new("users").with_column(email())),
            Change::add_column("users", email()),
            Change::alter_column("users", email(), email().not_null()),
            Change::add_constraint(
                "users",
                Constraint::Unique {
                    name: "users_email_key".into(),
                    columns: vec!["email".into()],
                },
            ),
        ];
        for change in &changes {
            assert_ne!(&change.reverse(), change);
            assert_eq!(&change.reverse().reverse(), change);
        }
        assert!(matches!(changes[0].reverse(), Change::DropTable(_)));
        assert!(matches!(
            changes[2].reverse(),
            Change::AlterColumn(AlterColumnOp { ref from, .. }) if !from.nullable
        ));
    }

    #[test]
    fn test_alterations() {
        let from = email().default(DefaultValue::String("none".into()));
        let to = Column::new("email", DataType::Text).not_null();
        let Change::AlterColumn(op) = Change::alter_column("users", from, to) else {
            unreachable!()
        };
        assert_eq!(op.column(), "email");
        assert_eq!(
            op.alterations(),
            vec![
                AlterColumnChange::SetDataType(DataType::Text),
                AlterColumnChange::SetNullable(false),
                AlterColumnChange::DropDefault,
            ]
        );
    }

    #[test]
    fn test_alterations_set_default() {
        let op = AlterColumnOp {
            table: "users".into(),
            from: email(),
            to: email().default(DefaultValue::String("x".into())),
        };
        assert_eq!(
            op.alterations(),
            vec![AlterColumnChange::SetDefault(DefaultValue::String(
                "x".into()
            ))]
        );
    }

    #[test]
    fn test_kind_labels() {
        let fk = Constraint::ForeignKey {
            name: "posts_authorId_fkey".into(),
            columns: vec!["authorId".into()],
            referenced_table: "users".into(),
            referenced_columns: vec!["id".into()],
            on_delete: crate::schema::ReferentialAction::Cascade,
            on_update: crate::schema::ReferentialAction::Cascade,
        };
        let add = Change::add_constraint("posts", fk);
        assert_eq!(add.kind(), "AddForeignKey");
        assert_eq!(add.reverse().kind(), "DropForeignKey");
        assert_eq!(add.table(), "posts");
        assert_eq!(Change::add_table(Table::new("t")).kind(), "CreateTable");
        assert!(Change::drop_column("t", email()).is_destructive());
    }

    #[test]
    fn test_from_op() {
        let change: Change = AddColumnOp {
            table: "users".into(),
            column: email(),
        }
        .into();
        assert_eq!(change, Change::add_column("users", email()));
    }
}
