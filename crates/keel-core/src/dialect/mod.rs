//! Dialect-specific SQL generation.
//!
//! Different databases have different DDL syntax. A [`Dialect`] turns one
//! [`Change`] into the statements that perform it, and the
//! [`StatementGenerator`] runs a whole change list through a dialect.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::change::{AddColumnOp, AddConstraintOp, AlterColumnOp, Change, DropColumnOp, DropConstraintOp};
use crate::error::{Error, Result};
use crate::schema::{Column, Constraint, DataType, DefaultValue, ReferentialAction, Table};

static POSTGRES: PostgresDialect = PostgresDialect::new();
static SQLITE: SqliteDialect = SqliteDialect::new();
static MYSQL: MysqlDialect = MysqlDialect::new();

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// PostgreSQL.
    #[serde(rename = "postgresql")]
    Postgres,
    /// SQLite.
    Sqlite,
    /// MySQL.
    Mysql,
}

impl DialectKind {
    /// Parses a dialect or provider identifier (`postgresql`, `postgres`,
    /// `pg`, `sqlite`, `sqlite3`, `mysql`), ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "mysql" => Some(Self::Mysql),
            _ => None,
        }
    }

    /// Returns the canonical identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
        }
    }

    /// Returns the dialect implementation.
    #[must_use]
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Self::Postgres => &POSTGRES,
            Self::Sqlite => &SQLITE,
            Self::Mysql => &MYSQL,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::unsupported(s, "SQL generation"))
    }
}

/// Trait for dialect-specific SQL generation.
///
/// Every method that can meet a change the database cannot express
/// returns [`Error::UnsupportedFeature`]. Every successful call returns
/// at least one statement.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the dialect kind.
    fn kind(&self) -> DialectKind;

    /// Generates the statements for a change.
    fn generate(&self, change: &Change) -> Result<Vec<String>> {
        match change {
            Change::AddTable(op) => self.create_table(&op.table),
            Change::DropTable(op) => self.drop_table(&op.table),
            Change::AddColumn(op) => self.add_column(op),
            Change::DropColumn(op) => self.drop_column(op),
            Change::AlterColumn(op) => self.alter_column(op),
            Change::AddConstraint(op) => self.add_constraint(op),
            Change::DropConstraint(op) => self.drop_constraint(op),
        }
    }

    /// Generates CREATE TABLE, followed by one CREATE INDEX per unique
    /// constraint and index of the table.
    fn create_table(&self, table: &Table) -> Result<Vec<String>> {
        let mut defs = Vec::with_capacity(table.columns.len() + table.constraints.len());
        for column in &table.columns {
            defs.push(format!("    {}", self.table_column_definition(table, column)?));
        }
        let inline_pk = self.inline_primary_key(table);
        for constraint in table.constraints.values() {
            if inline_pk && constraint.is_primary_key() {
                continue;
            }
            if let Some(clause) = self.table_constraint(constraint) {
                defs.push(format!("    {clause}"));
            }
        }

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_identifier(&table.name),
            defs.join(",\n")
        )];
        statements.extend(
            table
                .constraints
                .values()
                .filter(|c| matches!(c, Constraint::Unique { .. } | Constraint::Index { .. }))
                .map(|c| self.create_index(&table.name, c)),
        );
        Ok(statements)
    }

    /// Generates DROP TABLE.
    fn drop_table(&self, table: &Table) -> Result<Vec<String>> {
        Ok(vec![format!(
            "DROP TABLE {}",
            self.quote_identifier(&table.name)
        )])
    }

    /// Generates ADD COLUMN.
    fn add_column(&self, op: &AddColumnOp) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(&op.table),
            self.column_definition(&op.column)?
        )])
    }

    /// Generates DROP COLUMN.
    fn drop_column(&self, op: &DropColumnOp) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(&op.table),
            self.quote_identifier(&op.column.name)
        )])
    }

    /// Generates the statements changing a column's type, nullability or
    /// default.
    fn alter_column(&self, op: &AlterColumnOp) -> Result<Vec<String>>;

    /// Generates the statement adding a constraint: ALTER TABLE ... ADD
    /// for primary and foreign keys, CREATE INDEX otherwise.
    fn add_constraint(&self, op: &AddConstraintOp) -> Result<Vec<String>> {
        let statement = match self.table_constraint(&op.constraint) {
            Some(clause) => format!(
                "ALTER TABLE {} ADD {clause}",
                self.quote_identifier(&op.table)
            ),
            None => self.create_index(&op.table, &op.constraint),
        };
        Ok(vec![statement])
    }

    /// Generates the statement dropping a constraint.
    fn drop_constraint(&self, op: &DropConstraintOp) -> Result<Vec<String>> {
        let statement = match &op.constraint {
            Constraint::Unique { name, .. } | Constraint::Index { name, .. } => {
                self.drop_index(&op.table, name)
            }
            Constraint::PrimaryKey { name, .. } | Constraint::ForeignKey { name, .. } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.quote_identifier(&op.table),
                self.quote_identifier(name)
            ),
        };
        Ok(vec![statement])
    }

    /// Generates a column definition inside CREATE TABLE.
    fn table_column_definition(&self, _table: &Table, column: &Column) -> Result<String> {
        self.column_definition(column)
    }

    /// Returns `true` if the primary key of `table` is declared on its
    /// column rather than as a table constraint.
    fn inline_primary_key(&self, _table: &Table) -> bool {
        false
    }

    /// Generates a column definition.
    fn column_definition(&self, column: &Column) -> Result<String> {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type(column)?
        );
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = column
            .default
            .as_ref()
            .and_then(|d| self.render_default(d, &column.data_type))
        {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default);
        }
        if column.is_autoincrement() {
            sql.push_str(self.autoincrement_keyword());
        }
        Ok(sql)
    }

    /// Returns the SQL type of a column.
    fn column_type(&self, column: &Column) -> Result<String> {
        self.map_data_type(&column.data_type)
    }

    /// Returns the inline clause of a primary or foreign key. Unique
    /// constraints and indexes have none: they are created as indexes.
    fn table_constraint(&self, constraint: &Constraint) -> Option<String> {
        match constraint {
            Constraint::PrimaryKey { name, columns } => Some(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.quote_identifier(name),
                self.quote_list(columns)
            )),
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

    /// Generates `REFERENCES table (columns) ON DELETE ... ON UPDATE ...`.
    fn references_clause(
        &self,
        table: &str,
        columns: &[String],
        on_delete: ReferentialAction,
        on_update: ReferentialAction,
    ) -> String {
        format!(
            "REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_identifier(table),
            self.quote_list(columns),
            on_delete.as_sql(),
            on_update.as_sql()
        )
    }

    /// Generates CREATE [UNIQUE] INDEX for a unique constraint or index.
    fn create_index(&self, table: &str, index: &Constraint) -> String {
        let unique = if matches!(index, Constraint::Unique { .. }) {
            "UNIQUE "
        } else {
            ""
        };
        format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            self.quote_identifier(index.name()),
            self.quote_identifier(table),
            self.quote_list(index.columns())
        )
    }

    /// Generates DROP INDEX.
    fn drop_index(&self, _table: &str, name: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(name))
    }

    /// Maps a `DataType` to the dialect-specific SQL type.
    fn map_data_type(&self, data_type: &DataType) -> Result<String>;

    /// Renders a default value for a column of the given type. Returns
    /// `None` for defaults expressed through the column type or a
    /// keyword.
    fn render_default(&self, default: &DefaultValue, _data_type: &DataType) -> Option<String> {
        default.to_sql()
    }

    /// Returns the keyword appended to autoincrement columns.
    fn autoincrement_keyword(&self) -> &'static str {
        ""
    }

    /// Returns the identifier quote character.
    fn quote_char(&self) -> char {
        '"'
    }

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let q = self.quote_char();
        let escaped = name.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Quotes and comma-joins a list of identifiers.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Creates an `UnsupportedFeature` error naming this dialect.
    fn unsupported(&self, feature: &str) -> Error {
        Error::unsupported(self.kind().as_str(), feature)
    }
}

/// Runs change lists through a dialect.
#[derive(Debug, Clone, Copy)]
pub struct StatementGenerator<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> StatementGenerator<'d> {
    /// Creates a generator for the given dialect.
    #[must_use]
    pub const fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    /// Generates the statements for `changes`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] for the first change the
    /// dialect cannot express.
    pub fn generate(&self, changes: &[Change]) -> Result<Vec<String>> {
        Ok(self
            .generate_grouped(changes)?
            .into_iter()
            .flat_map(|(_, statements)| statements)
            .collect())
    }

    /// Generates the statements for `changes`, keeping each change next
    /// to its statements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] for the first change the
    /// dialect cannot express.
    pub fn generate_grouped<'c>(
        &self,
        changes: &'c [Change],
    ) -> Result<Vec<(&'c Change, Vec<String>)>> {
        let grouped = changes
            .iter()
            .map(|change| Ok((change, self.dialect.generate(change)?)))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            dialect = %self.dialect.kind(),
            changes = changes.len(),
            statements = grouped.iter().map(|(_, s)| s.len()).sum::<usize>(),
            "generated statements"
        );
        Ok(grouped)
    }
}

impl StatementGenerator<'static> {
    /// Creates a generator for a built-in dialect.
    #[must_use]
    pub fn for_kind(kind: DialectKind) -> Self {
        Self::new(kind.dialect())
    }
}

/// Generates the statements for `changes` in the dialect named by
/// `dialect_id`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFeature`] if the dialect is unknown or
/// cannot express one of the changes.
pub fn generate(changes: &[Change], dialect_id: &str) -> Result<Vec<String>> {
    let kind: DialectKind = dialect_id.parse()?;
    StatementGenerator::for_kind(kind).generate(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new("users")
            .with_column(
                Column::new("id", DataType::Integer)
                    .not_null()
                    .default(DefaultValue::Autoincrement),
            )
            .with_column(Column::new("email", DataType::String).not_null())
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
    fn test_dialect_names() {
        assert_eq!(DialectKind::from_name("pg"), Some(DialectKind::Postgres));
        assert_eq!(DialectKind::from_name("PostgreSQL"), Some(DialectKind::Postgres));
        assert_eq!(DialectKind::from_name("sqlite3"), Some(DialectKind::Sqlite));
        assert_eq!(DialectKind::from_name("mysql"), Some(DialectKind::Mysql));
        assert_eq!(DialectKind::from_name("oracle"), None);
        assert_eq!(DialectKind::Postgres.to_string(), "postgresql");
        assert_eq!(DialectKind::Mysql.dialect().kind(), DialectKind::Mysql);
    }

    #[test]
    fn test_unknown_dialect() {
        let err = generate(&[], "oracle").unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedFeature { ref dialect, .. } if dialect == "oracle"
        ));
    }

    #[test]
    fn test_dialect_kind_serde() {
        let json = serde_json::to_string(&DialectKind::Postgres).unwrap();
        assert_eq!(json, "\"postgresql\"");
        let kind: DialectKind = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(kind, DialectKind::Sqlite);
    }

    #[test]
    fn test_every_change_yields_statements() {
        let changes = vec![
            Change::add_table(users()),
            Change::add_column("users", Column::new("bio", DataType::Text)),
            Change::drop_column("users", Column::new("bio", DataType::Text)),
            Change::drop_table(users()),
        ];
        for kind in [DialectKind::Postgres, DialectKind::Sqlite, DialectKind::Mysql] {
            let grouped = StatementGenerator::for_kind(kind)
                .generate_grouped(&changes)
                .unwrap();
            assert_eq!(grouped.len(), changes.len());
            assert!(grouped.iter().all(|(_, statements)| !statements.is_empty()));

            let flat = generate(&changes, kind.as_str()).unwrap();
            assert!(flat.len() >= changes.len());
            assert!(generate(&changes[..2], kind.as_str()).unwrap().len() <= flat.len());
        }
    }

    #[test]
    fn test_create_table_emits_indexes() {
        let statements = PostgresDialect::new().create_table(&users()).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1],
            "CREATE UNIQUE INDEX \"users_email_key\" ON \"users\" (\"email\")"
        );
    }

    #[test]
    fn test_quote_identifier_escapes() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(
            MysqlDialect::new().quote_identifier("we`ird"),
            "`we``ird`"
        );
    }
}
