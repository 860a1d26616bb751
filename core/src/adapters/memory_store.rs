//! In-memory key-value store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::ports::KeyValueStore;

/// Key-value store that keeps lists in memory.
///
/// Clones share the same storage, so a clone handed to a second
/// [`WhitelistStore`](crate::WhitelistStore) behaves like a reload after a
/// restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    lists: Arc<RwLock<HashMap<String, Vec<String>>>>,
    saves: Arc<RwLock<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents under `key`, without going through the async port.
    pub fn get(&self, key: &str) -> Option<Vec<String>> {
        self.lists.read().get(key).cloned()
    }

    /// Number of completed `save_list` calls.
    pub fn save_count(&self) -> usize {
        *self.saves.read()
    }
}

impl KeyValueStore for MemoryStore {
    async fn load_list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.get(key).unwrap_or_default())
    }

    async fn save_list(&self, key: &str, values: &[String]) -> Result<()> {
        self.lists.write().insert(key.to_string(), values.to_vec());
        *self.saves.write() += 1;
        Ok(())
    }
}
