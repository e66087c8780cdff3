//! Keyed, file-backed task list store.
//!
//! Each key -- a calendar date such as `2026-08-23` or a template name
//! such as `templates/morning` -- maps to one markdown file under the
//! data root. The store is key-agnostic: both kinds resolve through
//! the same path scheme and the same locking.
//!
//! Saves are serialized per key and written to a temporary file that
//! is atomically renamed into place, so a reader racing a writer of
//! the same key observes either the old or the new complete file,
//! never a mix. Reads take no lock.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::codec::{self, CodecError};
use crate::task::Task;

/// Errors from reading or writing the backing files.
///
/// A missing file on read is NOT an error -- it is the empty list, so
/// "no tasks yet" costs the same as "task list cleared".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key cannot be mapped to a path under the data root.
    #[error("invalid task list key: {0}")]
    InvalidKey(String),

    /// Reading the backing file failed (other than not-found).
    #[error("reading {path}: {source}")]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Writing or renaming the backing file failed.
    #[error("writing {path}: {source}")]
    Write {
        /// Path that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The backing file exists but fails the record grammar.
    #[error(transparent)]
    Format(#[from] CodecError),
}

/// File-backed repository of task lists, one file per key.
///
/// Created once at startup and held for the life of the service.
pub struct TaskStore {
    data_dir: PathBuf,
    /// One mutex per key, guarding the write path only. Saves to
    /// different keys proceed independently.
    write_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl TaskStore {
    /// Creates a store rooted at `data_dir`. The directory does not
    /// need to exist yet; it is created on first save.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the task list for `key`, sorted however the file has
    /// it (saves keep files sorted; decode applies no sort).
    ///
    /// A key with no backing file yields the empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure other than not-found, or
    /// if the file content fails the record grammar.
    pub async fn get(&self, key: &str) -> Result<Vec<Task>, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(codec::decode(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Read { path, source: e }),
        }
    }

    /// Saves `tasks` as the complete new content for `key`, replacing
    /// any previous content.
    ///
    /// The list is stable-sorted ascending by time before encoding,
    /// so ties keep their relative input order. The write goes to a
    /// temporary file in the destination directory and is renamed
    /// into place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the key is invalid or the write
    /// fails.
    pub async fn save(&self, key: &str, mut tasks: Vec<Task>) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        tasks.sort_by(|a, b| a.time.cmp(&b.time));
        let text = codec::encode(&tasks);

        let lock = self.write_lock(key).await;
        let _guard = lock.lock().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Write {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        write_atomic(&path, text.as_bytes()).await
    }

    /// Lists the template names: `.md` files under
    /// `<data_dir>/templates`, extension stripped, sorted. A missing
    /// templates directory yields the empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] on directory read failure other
    /// than not-found.
    pub async fn list_templates(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.data_dir.join("templates");
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Read { path: dir, source: e }),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Read {
                path: dir.clone(),
                source: e,
            })?
        {
            let name = entry.file_name();
            if let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".md")) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolves a key to its backing file path.
    ///
    /// Keys pass through URL segments, so every `/`-separated segment
    /// must be non-empty and must not be a dot component; backslashes
    /// are rejected outright.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.contains('\\')
            && key
                .split('/')
                .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.data_dir.join(format!("{key}.md")))
    }

    /// Returns the write lock for `key`, creating it on first use.
    async fn write_lock(&self, key: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.write_locks.read().await;
            if let Some(lock) = locks.get(key) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.write_locks.write().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

/// Writes `bytes` to `path` via a uniquely-named temporary file in
/// the same directory, then renames it into place. The rename is
/// atomic on POSIX filesystems, so no reader ever observes a
/// partially-written file.
///
/// Also used by the weather recorder, which shares the data root.
///
/// # Errors
///
/// Returns [`StoreError::Write`] if the temporary file cannot be
/// written or renamed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension(format!("tmp.{}", Uuid::now_v7().simple()));

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::Write {
            path: tmp.clone(),
            source: e,
        })?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        // Leave no stray temp file behind.
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::Write {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}
