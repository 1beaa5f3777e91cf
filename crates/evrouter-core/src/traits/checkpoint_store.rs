// # Checkpoint Store Trait
//
// Defines the interface for persisting the router's position token.
//
// ## Purpose
//
// The router reports every cursor advance through a checkpoint callback.
// A store keeps the newest token so a restarted process can resume from it
// instead of re-forwarding the whole collection.
//
// ## Implementations
//
// - `MemoryCheckpointStore`: not persistent, for tests and ephemeral runs
// - `FileCheckpointStore`: JSON file with atomic writes and backup recovery

use async_trait::async_trait;

/// Persisted position record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointRecord {
    /// The last forwarded position token
    pub resource_version: String,
    /// When the token was saved
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

impl CheckpointRecord {
    pub(crate) fn new(resource_version: impl Into<String>) -> Self {
        Self {
            resource_version: resource_version.into(),
            saved_at: chrono::Utc::now(),
        }
    }
}

/// Trait for checkpoint store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the last saved token
    ///
    /// - `Ok(Some(token))`: a token was saved earlier
    /// - `Ok(None)`: nothing saved yet
    async fn load(&self) -> Result<Option<String>, crate::Error>;

    /// Save a new token
    async fn save(&self, resource_version: &str) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
