//! Key-value persistence backends.
//!
//! The playback engine persists a handful of small string values (credentials,
//! the last spoken position, voice/rate preference). The store is synchronous
//! and last-write-wins; both backends here are safe to share between tasks.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error occurred during filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Synchronous get/set/remove surface the engine persists through.
pub trait ResourceStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Returns the backend type as a string identifier.
    fn backend_type(&self) -> &str;
}

/// In-process store; contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryResourceStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ResourceStore for MemoryResourceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}

/// Store persisted as a single JSON object on disk.
///
/// The whole document is loaded on open and rewritten (temp file + rename) on
/// every mutation, so a crash never leaves a half-written file behind.
pub struct FileResourceStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileResourceStore {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// A missing file starts an empty store. An unreadable or corrupt file is
    /// an error rather than being silently discarded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let entries = match fs::read(&path) {
            Ok(data) if data.is_empty() => BTreeMap::new(),
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            "Opened file store at {} ({} keys)",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl ResourceStore for FileResourceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        if let Err(e) = self.flush(&entries) {
            warn!("Failed to persist removal of '{}': {}", key, e);
            return Err(e);
        }
        Ok(())
    }

    fn backend_type(&self) -> &str {
        "file"
    }
}

/// File-backed store at `path`, or an in-memory store when no path is given.
pub fn open_resource_store(path: Option<&Path>) -> Result<Arc<dyn ResourceStore>> {
    match path {
        Some(path) => Ok(Arc::new(FileResourceStore::open(path)?)),
        None => Ok(Arc::new(MemoryResourceStore::new())),
    }
}
