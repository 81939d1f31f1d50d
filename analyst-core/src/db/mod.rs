//! Database abstraction layer for the analyst tracker
//!
//! This module provides a trait-based abstraction for storage backends,
//! allowing the tracker to use different stores (YAML files, SQLite)
//! behind the same table-scoped CRUD contract.

mod migration;
mod sqlite_backend;
mod traits;
mod yaml_backend;

pub use migration::{
    export_backend_to_json, export_to_json, import_from_json, import_json_to_backend,
    migrate_between,
};
pub use sqlite_backend::SqliteBackend;
pub use traits::{BackendType, DatabaseBackend, DatabaseConfig, DatabaseStats};
pub use yaml_backend::YamlBackend;

use anyhow::Result;
use std::path::Path;

/// Infers the backend type from a file extension
pub fn infer_backend_type(path: &Path) -> BackendType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => BackendType::Yaml,
        Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
        _ => BackendType::Yaml, // Default to YAML
    }
}

/// Creates a database backend based on the file extension or explicit type
pub fn create_backend(
    path: &Path,
    backend_type: Option<BackendType>,
) -> Result<Box<dyn DatabaseBackend>> {
    let bt = backend_type.unwrap_or_else(|| infer_backend_type(path));
    log::debug!("opening {} backend at {:?}", bt, path);

    match bt {
        BackendType::Yaml => Ok(Box::new(YamlBackend::new(path))),
        BackendType::Sqlite => Ok(Box::new(SqliteBackend::new(path)?)),
    }
}

/// Opens a backend described by a `DatabaseConfig`
pub fn open(config: &DatabaseConfig) -> Result<Box<dyn DatabaseBackend>> {
    create_backend(&config.path, Some(config.backend_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_infer_backend_type() {
        assert_eq!(infer_backend_type(Path::new("a.yaml")), BackendType::Yaml);
        assert_eq!(infer_backend_type(Path::new("a.yml")), BackendType::Yaml);
        assert_eq!(infer_backend_type(Path::new("a.db")), BackendType::Sqlite);
        assert_eq!(infer_backend_type(Path::new("a.sqlite3")), BackendType::Sqlite);
        assert_eq!(infer_backend_type(Path::new("analysts")), BackendType::Yaml);
    }

    #[test]
    fn test_create_backend_explicit_type_wins() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.yaml");
        let backend = create_backend(&path, Some(BackendType::Sqlite)).unwrap();
        assert_eq!(backend.backend_type(), BackendType::Sqlite);
    }
}
