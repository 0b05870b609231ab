//! Directory-backed storage.
//!
//! Each key is stored as one JSON file inside a directory, wrapped in a
//! format-versioned [`Envelope`]. Writes within one process are serialized
//! by a lock. A batch is first written to temporary files, which are only
//! renamed over the records once every one of them is on disk. Concurrent
//! writers in separate processes are not coordinated.

use crate::envelope::Envelope;
use crate::error::StorageError;
use crate::storage::{Storage, StoreItem, WriteItem, next_version};
use async_trait::async_trait;
use colloquy_core::Result;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// A storage backend that keeps one file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    directory: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStorage {
    /// Opens (and creates, if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| StorageError::Backend {
                reason: format!("cannot create {}: {e}", directory.display()),
            })?;
        Ok(Self {
            directory,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Maps a key onto a file name.
    ///
    /// ASCII alphanumerics, `-` and `.` are kept; every other byte is
    /// written as `_` followed by two hex digits, so distinct keys never
    /// collide.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
                name.push(char::from(byte));
            } else {
                let _ = write!(name, "_{byte:02x}");
            }
        }
        name.push_str(".json");
        self.directory.join(name)
    }

    async fn read_one(&self, key: &str) -> Result<Option<StoreItem>, StorageError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Backend {
                    reason: format!("cannot read {}: {e}", path.display()),
                }
                .into());
            }
        };

        let envelope: Envelope<StoreItem> =
            Envelope::from_json_bytes(&bytes).map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if !envelope.is_current_format() {
            return Err(StorageError::Corrupt {
                key: key.to_string(),
                reason: format!("unsupported record format {}", envelope.format),
            }
            .into());
        }
        Ok(Some(envelope.into_record()))
    }

    /// Writes `item` next to its final path and returns the temporary file.
    async fn stage(&self, key: &str, item: StoreItem) -> Result<PathBuf, StorageError> {
        let temp = self.path_for(key).with_extension("json.tmp");
        let bytes = Envelope::new(item)
            .to_json_bytes()
            .map_err(|e| StorageError::Backend {
                reason: format!("cannot encode '{key}': {e}"),
            })?;

        if let Err(e) = tokio::fs::write(&temp, bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::Backend {
                reason: format!("cannot write {}: {e}", temp.display()),
            }
            .into());
        }
        Ok(temp)
    }

    async fn discard(&self, staged: &[(String, PathBuf, u64)]) {
        for (key, temp, _) in staged {
            if let Err(e) = tokio::fs::remove_file(temp).await {
                debug!(%key, error = %e, "could not remove staged file");
            }
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, StoreItem>, StorageError> {
        let mut items = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(item) = self.read_one(key).await? {
                items.insert(key.clone(), item);
            }
        }
        Ok(items)
    }

    #[instrument(skip(self, changes), fields(directory = %self.directory.display(), keys = changes.len()))]
    async fn write(
        &self,
        changes: HashMap<String, WriteItem>,
    ) -> Result<HashMap<String, u64>, StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut checked = Vec::with_capacity(changes.len());
        for (key, change) in changes {
            let actual = self.read_one(&key).await?.map(|item| item.version);
            if !change.expected.matches(actual) {
                debug!(%key, expected = %change.expected, ?actual, "rejected stale write");
                return Err(StorageError::Conflict {
                    key,
                    expected: change.expected,
                    actual,
                }
                .into());
            }
            let version = next_version(&key, actual)?;
            checked.push((key, change.value, version));
        }

        let mut staged = Vec::with_capacity(checked.len());
        for (key, value, version) in checked {
            match self.stage(&key, StoreItem { value, version }).await {
                Ok(temp) => staged.push((key, temp, version)),
                Err(report) => {
                    self.discard(&staged).await;
                    return Err(report);
                }
            }
        }

        let mut versions = HashMap::with_capacity(staged.len());
        for (key, temp, version) in staged {
            let path = self.path_for(&key);
            tokio::fs::rename(&temp, &path)
                .await
                .map_err(|e| StorageError::Backend {
                    reason: format!("cannot replace {}: {e}", path.display()),
                })?;
            versions.insert(key, version);
        }
        Ok(versions)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        for key in keys {
            let path = self.path_for(key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::Backend {
                        reason: format!("cannot delete {}: {e}", path.display()),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}
