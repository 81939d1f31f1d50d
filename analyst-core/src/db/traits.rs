//! Database abstraction traits
//!
//! This module defines the store contract that all storage backends must implement.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::models::{
    Analyst, AnalystChanges, Interaction, NewAnalyst, NewInteraction, NewReportMention,
    ReportMention, TrackerStore,
};

/// Types of database backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// YAML file storage (single file)
    Yaml,
    /// SQLite database storage
    Sqlite,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Yaml => write!(f, "YAML"),
            BackendType::Sqlite => write!(f, "SQLite"),
        }
    }
}

impl BackendType {
    /// Parses a backend name as used in config files and CLI flags
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yaml" | "yml" => Some(BackendType::Yaml),
            "sqlite" | "sqlite3" | "db" => Some(BackendType::Sqlite),
            _ => None,
        }
    }
}

/// Configuration for database backends
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database file
    pub path: PathBuf,
    /// Backend type
    pub backend_type: BackendType,
}

/// Core trait for database backends
///
/// The table-scoped operations mirror a remote CRUD service over
/// `analysts`, `interactions` and `reports`. Default implementations work
/// on the whole `TrackerStore` through `load()`/`save()`; backends with a
/// real query engine override them.
///
/// Deleting an analyst never touches its interactions or reports.
pub trait DatabaseBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the path to the database file
    fn path(&self) -> &std::path::Path;

    // =========================================================================
    // Full Store Operations
    // =========================================================================

    /// Loads the entire dataset
    fn load(&self) -> Result<TrackerStore>;

    /// Replaces the entire dataset
    fn save(&self, store: &TrackerStore) -> Result<()>;

    // =========================================================================
    // Analysts
    // =========================================================================

    /// Lists all analysts in insertion order
    fn list_analysts(&self) -> Result<Vec<Analyst>> {
        Ok(self.load()?.analysts)
    }

    /// Gets an analyst by its UUID
    fn get_analyst(&self, id: &Uuid) -> Result<Option<Analyst>> {
        let store = self.load()?;
        Ok(store.get_analyst_by_id(id).cloned())
    }

    /// Adds a new analyst and returns its identifier
    fn insert_analyst(&self, fields: NewAnalyst) -> Result<Uuid> {
        let mut store = self.load()?;
        let analyst = Analyst::from_new(fields);
        let id = analyst.id;
        store.analysts.push(analyst);
        self.save(&store)?;
        Ok(id)
    }

    /// Applies a partial update to an existing analyst
    fn update_analyst(&self, id: &Uuid, changes: &AnalystChanges) -> Result<()> {
        let mut store = self.load()?;
        match store.get_analyst_by_id_mut(id) {
            Some(analyst) => analyst.apply(changes),
            None => anyhow::bail!("Analyst not found: {}", id),
        }
        self.save(&store)
    }

    /// Deletes an analyst by UUID (does not cascade)
    fn delete_analyst(&self, id: &Uuid) -> Result<()> {
        let mut store = self.load()?;
        let original_len = store.analysts.len();
        store.analysts.retain(|a| &a.id != id);
        if store.analysts.len() == original_len {
            anyhow::bail!("Analyst not found: {}", id)
        }
        self.save(&store)
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// Lists interactions for an analyst, newest date first
    fn list_interactions(&self, analyst_id: &Uuid) -> Result<Vec<Interaction>> {
        Ok(self.load()?.interactions_for(analyst_id))
    }

    /// Records a new interaction and returns its identifier
    fn insert_interaction(&self, fields: NewInteraction) -> Result<Uuid> {
        let mut store = self.load()?;
        let interaction = Interaction::from_new(fields);
        let id = interaction.id;
        store.interactions.push(interaction);
        self.save(&store)?;
        Ok(id)
    }

    /// Removes every interaction owned by an analyst, returning how many
    fn delete_interactions_for(&self, analyst_id: &Uuid) -> Result<usize> {
        let mut store = self.load()?;
        let original_len = store.interactions.len();
        store.interactions.retain(|i| &i.analyst_id != analyst_id);
        let removed = original_len - store.interactions.len();
        if removed > 0 {
            self.save(&store)?;
        }
        Ok(removed)
    }

    // =========================================================================
    // Report Mentions
    // =========================================================================

    /// Lists report mentions for an analyst, newest report date first
    fn list_report_mentions(&self, analyst_id: &Uuid) -> Result<Vec<ReportMention>> {
        Ok(self.load()?.report_mentions_for(analyst_id))
    }

    /// Records a new report mention and returns its identifier
    fn insert_report_mention(&self, fields: NewReportMention) -> Result<Uuid> {
        let mut store = self.load()?;
        let mention = ReportMention::from_new(fields);
        let id = mention.id;
        store.report_mentions.push(mention);
        self.save(&store)?;
        Ok(id)
    }

    /// Removes every report mention owned by an analyst, returning how many
    fn delete_report_mentions_for(&self, analyst_id: &Uuid) -> Result<usize> {
        let mut store = self.load()?;
        let original_len = store.report_mentions.len();
        store.report_mentions.retain(|r| &r.analyst_id != analyst_id);
        let removed = original_len - store.report_mentions.len();
        if removed > 0 {
            self.save(&store)?;
        }
        Ok(removed)
    }

    /// Counts (interactions, report mentions) owned by an analyst
    fn count_children(&self, analyst_id: &Uuid) -> Result<(usize, usize)> {
        let store = self.load()?;
        let interactions = store
            .interactions
            .iter()
            .filter(|i| &i.analyst_id == analyst_id)
            .count();
        let reports = store
            .report_mentions
            .iter()
            .filter(|r| &r.analyst_id == analyst_id)
            .count();
        Ok((interactions, reports))
    }

    // =========================================================================
    // Utility Operations
    // =========================================================================

    /// Returns true if the database file exists
    fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Creates the database with empty data if it doesn't exist
    fn create_if_not_exists(&self) -> Result<()> {
        if !self.exists() {
            self.save(&TrackerStore::new())?;
        }
        Ok(())
    }

    /// Returns statistics about the database
    fn stats(&self) -> Result<DatabaseStats> {
        let store = self.load()?;
        let (orphan_interactions, orphan_reports) = store.orphan_counts();
        Ok(DatabaseStats {
            analyst_count: store.analysts.len(),
            interaction_count: store.interactions.len(),
            report_count: store.report_mentions.len(),
            orphan_interaction_count: orphan_interactions,
            orphan_report_count: orphan_reports,
            backend_type: self.backend_type(),
        })
    }
}

/// Statistics about a database
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub analyst_count: usize,
    pub interaction_count: usize,
    pub report_count: usize,
    pub orphan_interaction_count: usize,
    pub orphan_report_count: usize,
    pub backend_type: BackendType,
}
