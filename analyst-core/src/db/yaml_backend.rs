//! YAML file storage backend
//!
//! This backend stores all data in a single YAML file, using the
//! Storage implementation with file locking support.

use anyhow::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::traits::{BackendType, DatabaseBackend};
use crate::models::{
    Analyst, AnalystChanges, Interaction, NewAnalyst, NewInteraction, NewReportMention,
    ReportMention, TrackerStore,
};
use crate::storage::Storage;

/// YAML file backend implementation
///
/// Writes go through `Storage::update_atomically`, so each insert or
/// update re-reads the file under the write lock instead of saving a
/// stale copy.
pub struct YamlBackend {
    storage: Storage,
    path: PathBuf,
}

impl YamlBackend {
    /// Creates a new YAML backend for the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            storage: Storage::new(&path),
            path,
        }
    }
}

impl DatabaseBackend for YamlBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Yaml
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<TrackerStore> {
        self.storage.load()
    }

    fn save(&self, store: &TrackerStore) -> Result<()> {
        self.storage.save(store)
    }

    fn insert_analyst(&self, fields: NewAnalyst) -> Result<Uuid> {
        self.storage.update_atomically(|store| {
            let analyst = Analyst::from_new(fields);
            let id = analyst.id;
            store.analysts.push(analyst);
            Ok(id)
        })
    }

    fn update_analyst(&self, id: &Uuid, changes: &AnalystChanges) -> Result<()> {
        self.storage
            .update_atomically(|store| match store.get_analyst_by_id_mut(id) {
                Some(analyst) => {
                    analyst.apply(changes);
                    Ok(())
                }
                None => anyhow::bail!("Analyst not found: {}", id),
            })
    }

    fn delete_analyst(&self, id: &Uuid) -> Result<()> {
        self.storage.update_atomically(|store| {
            let original_len = store.analysts.len();
            store.analysts.retain(|a| &a.id != id);
            if store.analysts.len() == original_len {
                anyhow::bail!("Analyst not found: {}", id)
            }
            Ok(())
        })
    }

    fn insert_interaction(&self, fields: NewInteraction) -> Result<Uuid> {
        self.storage.update_atomically(|store| {
            let interaction = Interaction::from_new(fields);
            let id = interaction.id;
            store.interactions.push(interaction);
            Ok(id)
        })
    }

    fn insert_report_mention(&self, fields: NewReportMention) -> Result<Uuid> {
        self.storage.update_atomically(|store| {
            let mention = ReportMention::from_new(fields);
            let id = mention.id;
            store.report_mentions.push(mention);
            Ok(id)
        })
    }
}
