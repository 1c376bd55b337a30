// # File Key-Value Store
//
// Durable backend for the record store, kept as a single JSON document.
//
// ## Crash Recovery
//
// - Atomic writes: every `set` writes a temporary file and renames it over
//   the main file
// - Backup: the previous generation is copied to `.backup` before the rename
// - Recovery: a main file that fails to parse is replaced by the backup; if
//   the backup is unusable too the store starts empty and the next flush
//   rewrites the main file
// - A failed write leaves both the file and the in-memory view unchanged
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entries": {
//     "hostname/home.example.com.": {
//       "value": "192.0.2.10",
//       "updated_at": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::KeyValueStore;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-backed key-value store
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    entries: HashMap<String, StoredEntry>,
    dirty: bool,
}

/// One stored value
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFileFormat {
    version: String,
    entries: HashMap<String, StoredEntry>,
}

/// Why a store file could not be loaded
enum LoadFailure {
    /// The file could not be read at all
    Unreadable(Error),
    /// The file was read but is not a valid store document
    Corrupt(Error),
}

impl FileKvStore {
    /// Open the store at `path`, creating parent directories as needed
    ///
    /// A missing file yields an empty store. A corrupt file is recovered from
    /// its backup. An unreadable file is an error.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let (entries, dirty) = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState { entries, dirty })),
        })
    }

    /// Load the main file, falling back to the backup
    ///
    /// The flag is set when the main file on disk no longer matches the
    /// returned entries.
    async fn load_with_recovery(path: &Path) -> Result<(HashMap<String, StoredEntry>, bool), Error> {
        let err = match Self::load(path).await {
            Ok(entries) => {
                tracing::debug!(path = %path.display(), entries = entries.len(), "loaded record store");
                return Ok((entries, false));
            }
            Err(LoadFailure::Unreadable(e)) => return Err(e),
            Err(LoadFailure::Corrupt(e)) => e,
        };

        tracing::warn!("Store file appears corrupted: {}. Attempting recovery from backup.", err);

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with an empty store.");
            return Ok((HashMap::new(), true));
        }

        match Self::load(&backup_path).await {
            Ok(entries) => {
                tracing::info!("Recovered store from backup: {} entries", entries.len());
                let restored = fs::copy(&backup_path, path).await;
                if let Err(e) = &restored {
                    tracing::error!("Failed to restore store file from backup: {}", e);
                }
                Ok((entries, restored.is_err()))
            }
            Err(LoadFailure::Unreadable(e)) | Err(LoadFailure::Corrupt(e)) => {
                tracing::error!("Backup also unusable: {}. Starting with an empty store.", e);
                Ok((HashMap::new(), true))
            }
        }
    }

    async fn load(path: &Path) -> Result<HashMap<String, StoredEntry>, LoadFailure> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadFailure::Unreadable(Error::store(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadFailure::Corrupt(Error::store(format!(
                "Failed to parse store file {}: {}",
                path.display(),
                e
            )))
        })?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Loading anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.entries)
    }

    /// Write `entries` as the whole document, atomically
    ///
    /// Callers hold the state lock so writes never interleave.
    async fn persist(&self, entries: &HashMap<String, StoredEntry>) -> Result<(), Error> {
        let document = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            entries: entries.clone(),
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| Error::store(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            Error::store(format!("Failed to create temp file {}: {}", temp_path.display(), e))
        })?;
        file.write_all(json.as_bytes()).await.map_err(|e| {
            Error::store(format!("Failed to write temp file {}: {}", temp_path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            Error::store(format!("Failed to sync temp file {}: {}", temp_path.display(), e))
        })?;
        drop(file);

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!(path = %self.path.display(), "record store written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let state = self.state.read().await;
        Ok(state.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut state = self.state.write().await;

        let mut entries = state.entries.clone();
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                updated_at: Utc::now(),
            },
        );

        // Memory only follows a document that reached the disk.
        self.persist(&entries).await?;
        state.entries = entries;
        state.dirty = false;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if state.dirty {
            self.persist(&state.entries).await?;
            state.dirty = false;
        }
        Ok(())
    }
}
