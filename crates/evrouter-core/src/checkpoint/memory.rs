// # Memory Checkpoint Store
//
// In-memory implementation of CheckpointStore.
//
// ## Crash Behavior
//
// - The checkpoint is lost on restart/crash
// - The first run after a restart forwards everything the watch source
//   replays, since the cursor starts unset

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::checkpoint_store::{CheckpointRecord, CheckpointStore};

/// In-memory checkpoint store
///
/// Cloning shares the underlying checkpoint.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<RwLock<Option<CheckpointRecord>>>,
}

impl MemoryCheckpointStore {
    /// Create a new empty memory checkpoint store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `resource_version`
    pub fn with_checkpoint(resource_version: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(CheckpointRecord::new(resource_version)))),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.as_ref().map(|c| c.resource_version.clone()))
    }

    async fn save(&self, resource_version: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        *guard = Some(CheckpointRecord::new(resource_version));
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        store.save("100").await.unwrap();
        store.save("101").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("101".to_string()));
    }

    #[tokio::test]
    async fn test_clones_share_checkpoint() {
        let store = MemoryCheckpointStore::with_checkpoint("5");
        let clone = store.clone();

        clone.save("6").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("6".to_string()));
    }
}
