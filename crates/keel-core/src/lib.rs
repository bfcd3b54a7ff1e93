//! # keel-core
//!
//! Schema loading, diffing and SQL generation for keel migrations.
//!
//! This crate provides:
//! - A hand-written loader for a declarative schema language
//! - A differ that turns two schema snapshots into ordered changes
//! - Dialect-aware SQL generation for PostgreSQL, SQLite and MySQL
//!
//! ## From schema to SQL
//!
//! ```rust
//! use keel_core::{diff, generate, load_schema};
//!
//! let before = load_schema("v1", "model User {\n  id Int @id\n}").unwrap();
//! let after = load_schema(
//!     "v2",
//!     "model User {\n  id Int @id\n  name String?\n}",
//! )
//! .unwrap();
//!
//! let changes = diff(&before, &after).unwrap();
//! let sql = generate(&changes, "postgresql").unwrap();
//! assert_eq!(sql, vec![r#"ALTER TABLE "User" ADD COLUMN "name" TEXT"#]);
//! ```
//!
//! Applying the changes to the "before" snapshot reproduces the "after"
//! snapshot:
//!
//! ```rust
//! # use keel_core::{diff, load_schema};
//! # let before = load_schema("v1", "model User {\n  id Int @id\n}").unwrap();
//! # let after = load_schema("v2", "model User {\n  id Int @id\n  name String?\n}").unwrap();
//! let mut state = before.clone();
//! state.apply_all(&diff(&before, &after).unwrap()).unwrap();
//! assert!(state.structurally_eq(&after));
//! ```

pub mod change;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod lexer;
pub mod loader;
pub mod schema;
mod state;

pub use change::{AlterColumnChange, Change};
pub use dialect::{generate, Dialect, DialectKind, StatementGenerator};
pub use diff::{diff, DiffOptions, DiffWarning, Differ, ForeignKeyPlacement, RenamePolicy, SchemaDiff};
pub use error::{AmbiguousChange, Error, ParseError, Result};
pub use loader::load_schema;
pub use schema::{Column, Constraint, DataType, DefaultValue, ReferentialAction, SchemaSnapshot, Table};
