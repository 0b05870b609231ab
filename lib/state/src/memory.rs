//! In-process storage.
//!
//! Records live in a shared map for the lifetime of the process. Clones
//! share the same map, so one instance can be handed to every state scope.

use crate::error::StorageError;
use crate::storage::{Storage, StoreItem, WriteItem, next_version};
use async_trait::async_trait;
use colloquy_core::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// A storage backend that keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<RwLock<HashMap<String, StoreItem>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, StoreItem>, StorageError> {
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| items.get(key).map(|item| (key.clone(), item.clone())))
            .collect())
    }

    #[instrument(skip(self, changes), fields(keys = changes.len()))]
    async fn write(
        &self,
        changes: HashMap<String, WriteItem>,
    ) -> Result<HashMap<String, u64>, StorageError> {
        let mut items = self.items.write().await;

        let mut staged = Vec::with_capacity(changes.len());
        for (key, change) in changes {
            let actual = items.get(&key).map(|item| item.version);
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
            staged.push((
                key,
                StoreItem {
                    value: change.value,
                    version,
                },
            ));
        }

        let mut versions = HashMap::with_capacity(staged.len());
        for (key, item) in staged {
            versions.insert(key.clone(), item.version);
            items.insert(key, item);
        }

        Ok(versions)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}
