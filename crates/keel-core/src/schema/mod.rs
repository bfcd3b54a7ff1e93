//! Schema data model.
//!
//! Snapshots, tables, columns and constraints shared by the loader, the
//! differ and the dialects.

mod snapshot;
mod types;

pub use snapshot::{Column, Constraint, SchemaSnapshot, Table};
pub use types::{DataType, DefaultValue, ReferentialAction};
