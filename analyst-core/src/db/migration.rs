//! Migration utilities for converting between storage backends
//!
//! Copies a whole dataset between YAML and SQLite, and imports/exports
//! JSON for backups and interoperability.

use anyhow::{Context, Result};
use std::path::Path;

use super::traits::DatabaseBackend;
use crate::models::TrackerStore;

/// Copies every record from one backend into another, replacing its contents
///
/// # Returns
/// The number of analysts migrated
pub fn migrate_between(
    source: &dyn DatabaseBackend,
    target: &dyn DatabaseBackend,
) -> Result<usize> {
    let store = source
        .load()
        .with_context(|| format!("Failed to load {} database", source.backend_type()))?;

    let count = store.analysts.len();

    target
        .save(&store)
        .with_context(|| format!("Failed to save to {} database", target.backend_type()))?;

    log::info!(
        "migrated {} analysts from {} to {}",
        count,
        source.backend_type(),
        target.backend_type()
    );
    Ok(count)
}

/// Exports a TrackerStore to a JSON file
pub fn export_to_json<P: AsRef<Path>>(store: &TrackerStore, json_path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(store).context("Failed to serialize to JSON")?;

    std::fs::write(json_path, json).context("Failed to write JSON file")?;

    Ok(())
}

/// Imports a TrackerStore from a JSON file
pub fn import_from_json<P: AsRef<Path>>(json_path: P) -> Result<TrackerStore> {
    let json = std::fs::read_to_string(json_path).context("Failed to read JSON file")?;

    let store: TrackerStore = serde_json::from_str(&json).context("Failed to parse JSON")?;

    Ok(store)
}

/// Exports data from any backend to a JSON file
pub fn export_backend_to_json<P: AsRef<Path>>(
    backend: &dyn DatabaseBackend,
    json_path: P,
) -> Result<()> {
    let store = backend.load()?;
    export_to_json(&store, json_path)
}

/// Imports data from a JSON file into any backend, replacing its contents
pub fn import_json_to_backend<P: AsRef<Path>>(
    json_path: P,
    backend: &dyn DatabaseBackend,
) -> Result<usize> {
    let store = import_from_json(json_path)?;
    let count = store.analysts.len();
    backend.save(&store)?;
    Ok(count)
}
