//! PostgreSQL dialect.

use super::{Dialect, DialectKind};
use crate::change::{AlterColumnChange, AlterColumnOp};
use crate::error::Result;
use crate::schema::{Column, DataType, DefaultValue};

/// PostgreSQL dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn map_data_type(&self, data_type: &DataType) -> Result<String> {
        Ok(match data_type {
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Integer => "INTEGER".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Real => "REAL".to_string(),
            DataType::Double => "DOUBLE PRECISION".to_string(),
            DataType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            DataType::String | DataType::Text => "TEXT".to_string(),
            DataType::Char(n) => format!("CHAR({n})"),
            DataType::VarChar(n) => format!("VARCHAR({n})"),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::Timestamp(Some(p)) => format!("TIMESTAMP({p})"),
            DataType::Timestamp(None) => "TIMESTAMP".to_string(),
            DataType::TimestampTz(Some(p)) => format!("TIMESTAMPTZ({p})"),
            DataType::TimestampTz(None) => "TIMESTAMPTZ".to_string(),
            DataType::Json => "JSONB".to_string(),
            DataType::Bytes => "BYTEA".to_string(),
            DataType::Uuid => "UUID".to_string(),
        })
    }

    fn column_type(&self, column: &Column) -> Result<String> {
        // Sequences come with the SERIAL pseudo-types.
        if column.is_autoincrement() {
            match column.data_type {
                DataType::SmallInt => return Ok("SMALLSERIAL".to_string()),
                DataType::Integer => return Ok("SERIAL".to_string()),
                DataType::BigInt => return Ok("BIGSERIAL".to_string()),
                _ => {}
            }
        }
        self.map_data_type(&column.data_type)
    }

    fn alter_column(&self, op: &AlterColumnOp) -> Result<Vec<String>> {
        let column = self.quote_identifier(op.column());
        let mut clauses = Vec::new();
        for alteration in op.alterations() {
            let action = match alteration {
                AlterColumnChange::SetDataType(data_type) => {
                    format!("SET DATA TYPE {}", self.map_data_type(&data_type)?)
                }
                AlterColumnChange::SetNullable(true) => "DROP NOT NULL".to_string(),
                AlterColumnChange::SetNullable(false) => "SET NOT NULL".to_string(),
                AlterColumnChange::SetDefault(DefaultValue::Autoincrement) => {
                    return Err(self.unsupported(&format!(
                        "turning existing column `{}.{}` into an autoincrement column",
                        op.table,
                        op.column()
                    )));
                }
                AlterColumnChange::SetDefault(default) => {
                    match self.render_default(&default, &op.to.data_type) {
                        Some(value) => format!("SET DEFAULT {value}"),
                        None => continue,
                    }
                }
                AlterColumnChange::DropDefault => "DROP DEFAULT".to_string(),
            };
            clauses.push(format!("ALTER COLUMN {column} {action}"));
        }

        if clauses.is_empty() {
            return Err(self.unsupported(&format!(
                "an ALTER COLUMN on `{}.{}` without alterations",
                op.table,
                op.column()
            )));
        }
        Ok(vec![format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(&op.table),
            clauses.join(", ")
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{AddConstraintOp, Change, DropConstraintOp};
    use crate::error::Error;
    use crate::schema::{Constraint, ReferentialAction, Table};

    fn posts() -> Table {
        Table::new("posts")
            .with_column(
                Column::new("id", DataType::BigInt)
                    .not_null()
                    .default(DefaultValue::Autoincrement),
            )
            .with_column(Column::new("title", DataType::VarChar(200)).not_null())
            .with_column(
                Column::new("createdAt", DataType::Timestamp(Some(3)))
                    .not_null()
                    .default(DefaultValue::Expression("CURRENT_TIMESTAMP".into())),
            )
            .with_column(Column::new("authorId", DataType::Integer).not_null())
            .with_constraint(Constraint::PrimaryKey {
                name: "posts_pkey".into(),
                columns: vec!["id".into()],
            })
            .with_constraint(author_fk())
            .with_constraint(Constraint::Index {
                name: "posts_authorId_idx".into(),
                columns: vec!["authorId".into()],
            })
    }

    fn author_fk() -> Constraint {
        Constraint::ForeignKey {
            name: "posts_authorId_fkey".into(),
            columns: vec!["authorId".into()],
            referenced_table: "users".into(),
            referenced_columns: vec!["id".into()],
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::Cascade,
        }
    }

    #[test]
    fn test_postgres_data_types() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.map_data_type(&DataType::String).unwrap(), "TEXT");
        assert_eq!(dialect.map_data_type(&DataType::Double).unwrap(), "DOUBLE PRECISION");
        assert_eq!(dialect.map_data_type(&DataType::Json).unwrap(), "JSONB");
        assert_eq!(dialect.map_data_type(&DataType::Bytes).unwrap(), "BYTEA");
        assert_eq!(
            dialect.map_data_type(&DataType::TimestampTz(Some(6))).unwrap(),
            "TIMESTAMPTZ(6)"
        );
        assert_eq!(
            dialect
                .map_data_type(&DataType::Decimal {
                    precision: 10,
                    scale: 2
                })
                .unwrap(),
            "DECIMAL(10, 2)"
        );
    }

    #[test]
    fn test_create_table_with_serial() {
        let statements = PostgresDialect::new().create_table(&posts()).unwrap();
        assert_eq!(statements.len(), 2);
        let sql = &statements[0];
        assert!(sql.starts_with("CREATE TABLE \"posts\" (\n"));
        assert!(sql.contains("    \"id\" BIGSERIAL NOT NULL,\n"));
        assert!(sql.contains("\"title\" VARCHAR(200) NOT NULL"));
        assert!(sql.contains("\"createdAt\" TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("CONSTRAINT \"posts_pkey\" PRIMARY KEY (\"id\")"));
        assert!(sql.contains(
            "CONSTRAINT \"posts_authorId_fkey\" FOREIGN KEY (\"authorId\") \
             REFERENCES \"users\" (\"id\") ON DELETE CASCADE ON UPDATE CASCADE"
        ));
        assert_eq!(
            statements[1],
            "CREATE INDEX \"posts_authorId_idx\" ON \"posts\" (\"authorId\")"
        );
    }

    #[test]
    fn test_alter_column_sql() {
        let dialect = PostgresDialect::new();
        let from = Column::new("email", DataType::VarChar(100));
        let to = Column::new("email", DataType::Text)
            .not_null()
            .default(DefaultValue::String("none".into()));
        let change = Change::alter_column("users", from.clone(), to.clone());
        assert_eq!(
            dialect.generate(&change).unwrap(),
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" SET DATA TYPE TEXT, \
                 ALTER COLUMN \"email\" SET NOT NULL, \
                 ALTER COLUMN \"email\" SET DEFAULT 'none'"
                    .to_string()
            ]
        );

        let back = change.reverse();
        assert_eq!(
            dialect.generate(&back).unwrap(),
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" SET DATA TYPE VARCHAR(100), \
                 ALTER COLUMN \"email\" DROP NOT NULL, \
                 ALTER COLUMN \"email\" DROP DEFAULT"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_alter_to_autoincrement_is_unsupported() {
        let from = Column::new("id", DataType::Integer).not_null();
        let to = from.clone().default(DefaultValue::Autoincrement);
        let err = PostgresDialect::new()
            .generate(&Change::alter_column("users", from, to))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedFeature { ref dialect, .. } if dialect == "postgresql"
        ));
    }

    #[test]
    fn test_constraint_sql() {
        let dialect = PostgresDialect::new();
        let add = AddConstraintOp {
            table: "posts".into(),
            constraint: author_fk(),
        };
        assert_eq!(
            dialect.add_constraint(&add).unwrap(),
            vec![
                "ALTER TABLE \"posts\" ADD CONSTRAINT \"posts_authorId_fkey\" \
                 FOREIGN KEY (\"authorId\") REFERENCES \"users\" (\"id\") \
                 ON DELETE CASCADE ON UPDATE CASCADE"
                    .to_string()
            ]
        );

        let drop = DropConstraintOp {
            table: "posts".into(),
            constraint: author_fk(),
        };
        assert_eq!(
            dialect.drop_constraint(&drop).unwrap(),
            vec!["ALTER TABLE \"posts\" DROP CONSTRAINT \"posts_authorId_fkey\"".to_string()]
        );

        let drop_index = DropConstraintOp {
            table: "posts".into(),
            constraint: Constraint::Unique {
                name: "posts_title_key".into(),
                columns: vec!["title".into()],
            },
        };
        assert_eq!(
            dialect.drop_constraint(&drop_index).unwrap(),
            vec!["DROP INDEX \"posts_title_key\"".to_string()]
        );
    }

    #[test]
    fn test_add_and_drop_column() {
        let dialect = PostgresDialect::new();
        let column = Column::new("published", DataType::Boolean)
            .not_null()
            .default(DefaultValue::Boolean(false));
        assert_eq!(
            dialect
                .generate(&Change::add_column("posts", column.clone()))
                .unwrap(),
            vec![
                "ALTER TABLE \"posts\" ADD COLUMN \"published\" BOOLEAN NOT NULL DEFAULT false"
                    .to_string()
            ]
        );
        assert_eq!(
            dialect
                .generate(&Change::drop_column("posts", column))
                .unwrap(),
            vec!["ALTER TABLE \"posts\" DROP COLUMN \"published\"".to_string()]
        );
    }
}
