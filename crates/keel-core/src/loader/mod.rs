//! Schema model loader.
//!
//! Turns a declarative schema file into a [`SchemaSnapshot`]:
//!
//! ```
//! use keel_core::loader::load_schema;
//!
//! let snapshot = load_schema(
//!     "blog",
//!     r#"
//!     model User {
//!       id    Int    @id @default(autoincrement())
//!       email String @unique
//!     }
//!     "#,
//! )
//! .unwrap();
//!
//! let users = snapshot.table("User").unwrap();
//! assert_eq!(users.columns.len(), 2);
//! assert!(users.constraints.contains_key("User_email_key"));
//! ```

mod ast;
mod lower;
mod parser;

use tracing::{debug, trace};

use crate::error::ParseError;
use crate::schema::SchemaSnapshot;

/// Parses and validates `source`, returning a snapshot named `name`.
///
/// # Errors
///
/// Returns a [`ParseError`] naming the offending declaration when the
/// source is malformed or describes an invalid schema.
pub fn load_schema(name: &str, source: &str) -> Result<SchemaSnapshot, ParseError> {
    let ast = parser::Parser::new(source).parse_schema()?;
    trace!(blocks = ast.blocks.len(), "parsed schema");

    let snapshot = lower::lower(name, &ast, source)?;
    debug!(
        schema = name,
        tables = snapshot.tables.len(),
        provider = ?snapshot.provider,
        "loaded schema"
    );
    Ok(snapshot)
}
