//! Store that snapshots its whole state to disk after every mutation.
//!
//! Wraps a [`MemoryStore`] and delegates every call to it. Writes go to a
//! temp file that is renamed over the target, so a reader never sees a
//! partial snapshot. A failed save is reported but the in-memory change
//! stays; memory and disk agree again after the next successful save.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use txtline_core::Clock;

use crate::memory::MemoryStore;
use crate::store::{MessageStore, Result, Snapshot, StoreError, StoreStats, StoredMessage};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("snapshot {path} is not valid: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where snapshots go.
pub trait Persistence: Send + Sync {
    fn save(&self, snapshot: &Snapshot) -> std::result::Result<(), PersistError>;

    /// `None` if nothing has been saved yet.
    fn load(&self) -> std::result::Result<Option<Snapshot>, PersistError>;
}

/// Pretty-printed JSON file.
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Persistence for JsonFile {
    fn save(&self, snapshot: &Snapshot) -> std::result::Result<(), PersistError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let write_err = |source| PersistError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        // tmp file → rename
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(write_err)?;
            file.write_all(&json).map_err(write_err)?;
            file.sync_all().map_err(write_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        tracing::trace!(path = %self.path.display(), bytes = json.len(), "snapshot written");
        Ok(())
    }

    fn load(&self) -> std::result::Result<Option<Snapshot>, PersistError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let snapshot = serde_json::from_slice(&bytes).map_err(|source| PersistError::Decode {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(snapshot))
    }
}

pub struct PersistedStore {
    memory: MemoryStore,
    persistence: Box<dyn Persistence>,
    /// Held across snapshot + write so saves never interleave.
    save_lock: Mutex<()>,
}

impl PersistedStore {
    /// Build on top of `persistence`, loading any snapshot it already holds.
    pub fn open(persistence: Box<dyn Persistence>, clock: Arc<dyn Clock>) -> Result<Self> {
        let memory = MemoryStore::with_clock(clock);
        if let Some(snapshot) = persistence.load()? {
            tracing::info!(messages = snapshot.messages.len(), "loaded store snapshot");
            memory.restore(snapshot);
        }
        Ok(Self {
            memory,
            persistence,
            save_lock: Mutex::new(()),
        })
    }

    pub fn json_file(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::open(Box::new(JsonFile::new(path)), clock)
    }

    /// Write the current state out.
    pub fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock();
        let snapshot = self.memory.snapshot();
        self.persistence.save(&snapshot).map_err(|e| {
            tracing::error!(error = %e, "snapshot save failed; memory and disk now differ");
            StoreError::from(e)
        })
    }
}

impl MessageStore for PersistedStore {
    fn store_message(&self, msg: StoredMessage) -> Result<()> {
        self.memory.store_message(msg)?;
        self.save()
    }

    fn get_message(&self, id: &str) -> Result<StoredMessage> {
        self.memory.get_message(id)
    }

    fn get_chunk(&self, message_id: &str, name: &str) -> Result<String> {
        self.memory.get_chunk(message_id, name)
    }

    fn chunk_owner(&self, name: &str) -> Option<String> {
        self.memory.chunk_owner(name)
    }

    fn get_new_messages(&self, client_id: &str) -> Result<Vec<StoredMessage>> {
        self.memory.get_new_messages(client_id)
    }

    fn mark_as_delivered(&self, message_id: &str, client_id: &str) -> Result<()> {
        self.memory.mark_as_delivered(message_id, client_id)?;
        self.save()
    }

    fn mark_as_consumed(&self, message_id: &str, client_id: &str) -> Result<()> {
        self.memory.mark_as_consumed(message_id, client_id)?;
        self.save()
    }

    fn list_messages(&self) -> Result<Vec<StoredMessage>> {
        self.memory.list_messages()
    }

    fn clean_expired(&self, ttl: Duration) -> Result<usize> {
        let removed = self.memory.clean_expired(ttl)?;
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    fn stats(&self) -> StoreStats {
        self.memory.stats()
    }
}
