//! Reading schema files.

use std::fs;
use std::path::Path;

use keel_core::{load_schema, SchemaSnapshot};
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Reads a schema from `path`.
///
/// Files with a `.json` extension hold a serialized [`SchemaSnapshot`];
/// anything else is a schema file and goes through the loader, with the
/// file stem as snapshot name.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or deserialized.
pub fn read_schema(path: &Path) -> Result<SchemaSnapshot> {
    let source = fs::read_to_string(path)?;
    let snapshot = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&source)?
    } else {
        let name = path
            .file_stem()
            .map_or_else(|| "schema".to_string(), |s| s.to_string_lossy().into_owned());
        load_schema(&name, &source).map_err(|source| MigrateError::Schema {
            path: path.to_path_buf(),
            source,
        })?
    };
    debug!(path = %path.display(), tables = snapshot.tables.len(), "read schema");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_schema_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blog.keel");
        fs::write(&path, "model Tag {\n  id Int @id\n  label String\n}\n").unwrap();

        let snapshot = read_schema(&path).unwrap();
        assert_eq!(snapshot.name, "blog");
        assert!(snapshot.table("Tag").is_some());
    }

    #[test]
    fn test_read_snapshot_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = SchemaSnapshot::new("saved");
        fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        assert_eq!(read_schema(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_invalid_schema_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.keel");
        fs::write(&path, "model Tag {\n  id Foo @id\n}\n").unwrap();

        let err = read_schema(&path).unwrap_err();
        assert!(matches!(err, MigrateError::Schema { .. }));
        let message = err.to_string();
        assert!(message.contains("broken.keel"));
        assert!(message.contains("unknown type `Foo`"));
    }
}
