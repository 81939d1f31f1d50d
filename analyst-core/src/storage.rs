use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::models::TrackerStore;

/// How long to wait for another process to release the lock
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Handles saving and loading the tracker dataset from a YAML file, with
/// advisory file locking so concurrent CLI invocations don't interleave
pub struct Storage {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let lock_file_path = file_path.with_extension("yaml.lock");
        Self {
            file_path,
            lock_file_path,
        }
    }

    /// Returns the path to the storage file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn acquire_lock(&self, mode: LockMode) -> Result<File> {
        if let Some(parent) = self.lock_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_file_path))?;

        let start = Instant::now();
        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&lock_file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&lock_file),
            };
            match attempt {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another process may be writing: {:?}",
                            self.file_path
                        );
                    }
                    log::debug!("waiting for {:?} lock on {:?}", mode, self.lock_file_path);
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to acquire lock on {:?}", self.lock_file_path)
                    })
                }
            }
        }
    }

    fn read_unlocked(&self) -> Result<TrackerStore> {
        let file = File::open(&self.file_path)
            .with_context(|| format!("Failed to open file: {:?}", self.file_path))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse YAML from {:?}", self.file_path))
    }

    fn write_unlocked(&self, store: &TrackerStore, lock_file: &mut File) -> Result<()> {
        // Lock holder info, for debugging stuck locks
        let _ = lock_file.set_len(0);
        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        let yaml = serde_yaml::to_string(store)?;
        fs::write(&self.file_path, yaml)
            .with_context(|| format!("Failed to write {:?}", self.file_path))?;
        Ok(())
    }

    /// Loads the dataset, creating an empty file on first use
    pub fn load(&self) -> Result<TrackerStore> {
        if !self.file_path.exists() {
            let default_store = TrackerStore::new();
            self.save(&default_store)?;
            return Ok(default_store);
        }

        let _lock = self.acquire_lock(LockMode::Shared)?;
        self.read_unlocked()
    }

    /// Saves the dataset, replacing the file contents
    pub fn save(&self, store: &TrackerStore) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock_file = self.acquire_lock(LockMode::Exclusive)?;
        self.write_unlocked(store, &mut lock_file)
        // Lock is released when lock_file is dropped
    }

    /// Reloads, applies `update_fn`, and saves while holding the write lock
    pub fn update_atomically<F, T>(&self, update_fn: F) -> Result<T>
    where
        F: FnOnce(&mut TrackerStore) -> Result<T>,
    {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock_file = self.acquire_lock(LockMode::Exclusive)?;

        let mut store = if self.file_path.exists() {
            self.read_unlocked()?
        } else {
            TrackerStore::new()
        };

        let value = update_fn(&mut store)?;
        self.write_unlocked(&store, &mut lock_file)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Analyst, NewAnalyst};
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("analysts.yaml");
        let storage = Storage::new(&path);

        let store = storage.load().unwrap();
        assert!(store.analysts.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_update_atomically_persists() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("analysts.yaml"));

        let id = storage
            .update_atomically(|store| {
                let analyst = Analyst::from_new(NewAnalyst::new("Jane Doe", "Gartner"));
                let id = analyst.id;
                store.analysts.push(analyst);
                Ok(id)
            })
            .unwrap();

        let store = storage.load().unwrap();
        assert_eq!(store.analysts.len(), 1);
        assert_eq!(store.analysts[0].id, id);
    }

    #[test]
    fn test_update_atomically_error_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("analysts.yaml"));
        storage.save(&TrackerStore::new()).unwrap();

        let result: Result<()> = storage.update_atomically(|store| {
            store.name = "changed".to_string();
            anyhow::bail!("rejected")
        });
        assert!(result.is_err());
        assert_eq!(storage.load().unwrap().name, "");
    }
}
