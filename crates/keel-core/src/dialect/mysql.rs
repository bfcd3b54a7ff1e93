//! MySQL dialect.

use super::{Dialect, DialectKind};
use crate::change::{AlterColumnOp, DropConstraintOp};
use crate::error::Result;
use crate::schema::{Constraint, DataType, DefaultValue};

/// MySQL dialect for migration SQL generation.
///
/// Identifiers are quoted with backticks. Plain `String` columns map to
/// `VARCHAR(191)` so they can be indexed under utf8mb4.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn map_data_type(&self, data_type: &DataType) -> Result<String> {
        Ok(match data_type {
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Integer => "INT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Real => "FLOAT".to_string(),
            DataType::Double => "DOUBLE".to_string(),
            DataType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            DataType::String => "VARCHAR(191)".to_string(),
            DataType::Text => "TEXT".to_string(),
            DataType::Char(n) => format!("CHAR({n})"),
            DataType::VarChar(n) => format!("VARCHAR({n})"),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::Timestamp(Some(p)) => format!("DATETIME({p})"),
            DataType::Timestamp(None) => "DATETIME".to_string(),
            DataType::Json => "JSON".to_string(),
            DataType::Bytes => "LONGBLOB".to_string(),
            DataType::Uuid => "CHAR(36)".to_string(),
            DataType::TimestampTz(_) => {
                return Err(self.unsupported(&format!("the {data_type} type")));
            }
        })
    }

    fn render_default(&self, default: &DefaultValue, data_type: &DataType) -> Option<String> {
        // The default must carry the column's fractional precision.
        match (default, data_type) {
            (DefaultValue::Expression(expr), DataType::Timestamp(Some(p)))
                if expr.eq_ignore_ascii_case("CURRENT_TIMESTAMP") =>
            {
                Some(format!("CURRENT_TIMESTAMP({p})"))
            }
            _ => default.to_sql(),
        }
    }

    fn autoincrement_keyword(&self) -> &'static str {
        " AUTO_INCREMENT"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn table_constraint(&self, constraint: &Constraint) -> Option<String> {
        match constraint {
            // Primary keys are always named PRIMARY.
            Constraint::PrimaryKey { columns, .. } => {
                Some(format!("PRIMARY KEY ({})", self.quote_list(columns)))
            }
            Constraint::ForeignKey {
                name,
                columns,
                referenced_table,
                referenced_columns,
                on_delete,
                on_update,
            } => Some(format!(
                "CONSTRAINT {} FOREIGN KEY ({}) {}",
                self.quote_identifier(name),
                self.quote_list(columns),
                self.references_clause(referenced_table, referenced_columns, *on_delete, *on_update)
            )),
            Constraint::Unique { .. } | Constraint::Index { .. } => None,
        }
    }

    fn alter_column(&self, op: &AlterColumnOp) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(&op.table),
            self.column_definition(&op.to)?
        )])
    }

    fn drop_constraint(&self, op: &DropConstraintOp) -> Result<Vec<String>> {
        let table = self.quote_identifier(&op.table);
        let statement = match &op.constraint {
            Constraint::PrimaryKey { .. } => format!("ALTER TABLE {table} DROP PRIMARY KEY"),
            Constraint::ForeignKey { name, .. } => format!(
                "ALTER TABLE {table} DROP FOREIGN KEY {}",
                self.quote_identifier(name)
            ),
            Constraint::Unique { name, .. } | Constraint::Index { name, .. } => {
                self.drop_index(&op.table, name)
            }
        };
        Ok(vec![statement])
    }

    fn drop_index(&self, table: &str, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change;
    use crate::error::Error;
    use crate::schema::{Column, ReferentialAction, Table};

    fn users() -> Table {
        Table::new("users")
            .with_column(
                Column::new("id", DataType::Integer)
                    .not_null()
                    .default(DefaultValue::Autoincrement),
            )
            .with_column(Column::new("email", DataType::String).not_null())
            .with_column(
                Column::new("createdAt", DataType::Timestamp(Some(3)))
                    .not_null()
                    .default(DefaultValue::Expression("CURRENT_TIMESTAMP".into())),
            )
            .with_constraint(Constraint::PrimaryKey {
                name: "users_pkey".into(),
                columns: vec!["id".into()],
            })
            .with_constraint(Constraint::Unique {
                name: "users_email_key".into(),
                columns: vec!["email".into()],
            })
    }

    #[test]
    fn test_mysql_data_types() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.map_data_type(&DataType::String).unwrap(), "VARCHAR(191)");
        assert_eq!(dialect.map_data_type(&DataType::Integer).unwrap(), "INT");
        assert_eq!(dialect.map_data_type(&DataType::Uuid).unwrap(), "CHAR(36)");
        assert_eq!(dialect.map_data_type(&DataType::Bytes).unwrap(), "LONGBLOB");
        assert!(matches!(
            dialect.map_data_type(&DataType::TimestampTz(None)),
            Err(Error::UnsupportedFeature { ref dialect, .. }) if dialect == "mysql"
        ));
    }

    #[test]
    fn test_create_table_sql() {
        let statements = MysqlDialect::new().create_table(&users()).unwrap();
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE `users` (\n    \
                 `id` INT NOT NULL AUTO_INCREMENT,\n    \
                 `email` VARCHAR(191) NOT NULL,\n    \
                 `createdAt` DATETIME(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),\n    \
                 PRIMARY KEY (`id`)\n)"
                    .to_string(),
                "CREATE UNIQUE INDEX `users_email_key` ON `users` (`email`)".to_string(),
            ]
        );
    }

    #[test]
    fn test_modify_column() {
        let from = Column::new("email", DataType::String).not_null();
        let to = Column::new("email", DataType::VarChar(320));
        assert_eq!(
            MysqlDialect::new()
                .generate(&Change::alter_column("users", from, to))
                .unwrap(),
            vec!["ALTER TABLE `users` MODIFY COLUMN `email` VARCHAR(320)".to_string()]
        );
    }

    #[test]
    fn test_drop_constraints() {
        let dialect = MysqlDialect::new();
        let fk = Constraint::ForeignKey {
            name: "posts_authorId_fkey".into(),
            columns: vec!["authorId".into()],
            referenced_table: "users".into(),
            referenced_columns: vec!["id".into()],
            on_delete: ReferentialAction::SetNull,
            on_update: ReferentialAction::Cascade,
        };
        assert_eq!(
            dialect
                .generate(&Change::drop_constraint("posts", fk))
                .unwrap(),
            vec!["ALTER TABLE `posts` DROP FOREIGN KEY `posts_authorId_fkey`".to_string()]
        );

        let pk = users().primary_key().cloned().unwrap();
        assert_eq!(
            dialect
                .generate(&Change::drop_constraint("users", pk.clone()))
                .unwrap(),
            vec!["ALTER TABLE `users` DROP PRIMARY KEY".to_string()]
        );
        assert_eq!(
            dialect
                .generate(&Change::add_constraint("users", pk))
                .unwrap(),
            vec!["ALTER TABLE `users` ADD PRIMARY KEY (`id`)".to_string()]
        );

        let unique = Constraint::Unique {
            name: "users_email_key".into(),
            columns: vec!["email".into()],
        };
        assert_eq!(
            dialect
                .generate(&Change::drop_constraint("users", unique))
                .unwrap(),
            vec!["DROP INDEX `users_email_key` ON `users`".to_string()]
        );
    }
}
