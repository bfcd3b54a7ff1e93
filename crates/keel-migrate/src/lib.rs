//! SQL migrations generated from declarative schema files.
//!
//! `keel-migrate` compares the schema file with the snapshot recorded by
//! the latest migration and writes the difference as a new migration:
//! - Changes are verified by replaying them before anything is written
//! - SQL generation is dialect-aware (PostgreSQL, SQLite, MySQL)
//! - Every migration records the schema it produces
//!
//! # Layout
//!
//! ```text
//! migrations/
//!   20260101120000_init/
//!     migration.sql
//!     snapshot.json
//!   20260102093000_add_comments/
//!     migration.sql
//!     snapshot.json
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use keel_migrate::prelude::*;
//!
//! # fn main() -> keel_migrate::error::Result<()> {
//! let config = MigrateConfig::default();
//! let schema = read_schema(&config.schema)?;
//! let dialect = config.resolve_dialect(&schema)?;
//!
//! let history = MigrationHistory::new(&config.migrations_dir);
//! let writer = MigrationWriter::new(dialect, config.diff_options(dialect));
//! let plan = writer.plan(&history.latest_snapshot()?, &schema)?;
//! if !plan.is_empty() {
//!     writer.write(history.dir(), "add comments", Utc::now().naive_utc(), &plan)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Check the schema file
//! keel-migrate validate
//!
//! # Print the SQL between two schemas
//! keel-migrate diff --from empty --to schema.keel
//!
//! # Write a migration for the schema changes
//! keel-migrate create --name add_comments
//!
//! # Compare the migrations with the schema
//! keel-migrate status
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod schema;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::MigrateConfig;
    pub use crate::error::{MigrateError, Result};
    pub use crate::history::{MigrationEntry, MigrationHistory, MigrationStatus};
    pub use crate::schema::read_schema;
    pub use crate::writer::{render, sanitize_name, MigrationPlan, MigrationWriter};
}
