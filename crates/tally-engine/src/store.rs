//! `JsonStore` — single-file JSON persistence for the record store.
//!
//! Load failures collapse into an empty store: the engine favors
//! availability over strict durability and accepts data loss on a
//! corrupt file. Saves serialize the full store to `<path>.tmp` and
//! atomically rename, so a crash mid-write never leaves a partial
//! store behind. An advisory lock on a sidecar file serializes writers
//! across processes; everything else reads through the manager.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fd_lock::RwLock as FileLock;
use tracing::{debug, warn};

use tally_core::errors::StoreError;
use tally_core::records::RecordStore;

pub struct JsonStore {
    path: PathBuf,
    lock: FileLock<File>,
}

impl JsonStore {
    /// Open a store at `path`. Creates parent directories and probes
    /// the sidecar lock so a competing writer fails fast instead of
    /// at its first save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
            }
        }

        let lock_path = sibling(&path, ".lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_error(&lock_path, &e))?;

        let mut lock = FileLock::new(lock_file);
        match lock.try_write() {
            Ok(guard) => drop(guard),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(StoreError::Locked {
                    path: lock_path.display().to_string(),
                });
            }
            Err(e) => return Err(io_error(&lock_path, &e)),
        }

        Ok(Self { path, lock })
    }

    /// Read the full record store. Any read or parse failure is logged
    /// and yields an empty store; a missing file is silently empty.
    pub fn load(&self) -> RecordStore {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(store) => store,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e,
                        "record store unreadable, starting empty");
                    RecordStore::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => RecordStore::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e,
                    "record store unreadable, starting empty");
                RecordStore::default()
            }
        }
    }

    /// Persist the full record store: write `<path>.tmp` under the
    /// writer lock, then rename over the live file.
    pub fn save(&mut self, store: &RecordStore) -> Result<(), StoreError> {
        let _guard = self.lock.try_write().map_err(|e| {
            if e.kind() == ErrorKind::WouldBlock {
                StoreError::Locked {
                    path: self.path.display().to_string(),
                }
            } else {
                io_error(&self.path, &e)
            }
        })?;

        let raw = serde_json::to_string_pretty(store).map_err(|e| StoreError::Serialize {
            message: e.to_string(),
        })?;

        let tmp_path = sibling(&self.path, ".tmp");
        fs::write(&tmp_path, raw).map_err(|e| io_error(&tmp_path, &e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| io_error(&self.path, &e))?;

        debug!(path = %self.path.display(), users = store.len(), "record store saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<path><suffix>` next to the store file.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn io_error(path: &Path, e: &std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
