// # File Checkpoint Store
//
// File-based implementation of CheckpointStore with crash recovery.
//
// ## Purpose
//
// Keeps the router's position token across restarts so a restarted process
// resumes instead of re-forwarding every event it can see.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good checkpoint
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "checkpoint": {
//     "resource_version": "184467",
//     "saved_at": "2025-01-09T12:00:00Z"
//   }
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::checkpoint_store::{CheckpointRecord, CheckpointStore};

/// Checkpoint file format version
const CHECKPOINT_FILE_VERSION: &str = "1.0";

/// File-based checkpoint store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use evrouter_core::checkpoint::FileCheckpointStore;
/// use evrouter_core::traits::CheckpointStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileCheckpointStore::new("/var/lib/evrouter/position.json").await?;
///
///     store.save("184467").await?;
///     assert_eq!(store.load().await?, Some("184467".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

/// Internal state for file-based store
#[derive(Debug)]
struct FileState {
    checkpoint: Option<CheckpointRecord>,
    dirty: bool,
}

/// Serializable checkpoint file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CheckpointFileFormat {
    version: String,
    checkpoint: Option<CheckpointRecord>,
}

impl FileCheckpointStore {
    /// Create or load a file checkpoint store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing checkpoint file
    /// 3. If it is corrupted, try the backup
    /// 4. If both fail, start with no checkpoint
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create checkpoint directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let checkpoint = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                checkpoint,
                dirty: false,
            })),
        })
    }

    /// Load the checkpoint with automatic recovery from backup
    async fn load_with_recovery(path: &Path) -> Result<Option<CheckpointRecord>, Error> {
        match Self::load_file(path).await {
            Ok(checkpoint) => Ok(checkpoint),
            Err(LoadError::Corrupted(e)) => {
                tracing::warn!(
                    "Checkpoint file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting without a checkpoint.");
                    return Ok(None);
                }

                match Self::load_file(&backup_path).await {
                    Ok(checkpoint) => {
                        tracing::info!(
                            "Recovered checkpoint from backup: {:?}",
                            checkpoint.as_ref().map(|c| &c.resource_version)
                        );

                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore checkpoint file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(checkpoint)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting without a checkpoint.",
                            backup_err
                        );
                        Ok(None)
                    }
                }
            }
            Err(LoadError::Io(e)) => Err(e),
        }
    }

    /// Load the checkpoint from a file
    async fn load_file(path: &Path) -> Result<Option<CheckpointRecord>, LoadError> {
        if !path.exists() {
            tracing::debug!("Checkpoint file does not exist: {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Io(Error::checkpoint(format!(
                "Failed to read checkpoint file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: CheckpointFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupted(Error::checkpoint(format!(
                "Failed to parse checkpoint file {}: {}",
                path.display(),
                e
            )))
        })?;

        if file.version != CHECKPOINT_FILE_VERSION {
            tracing::warn!(
                "Checkpoint file version mismatch: expected {}, got {}. Attempting to load anyway.",
                CHECKPOINT_FILE_VERSION,
                file.version
            );
        }

        Ok(file.checkpoint)
    }

    /// Write the checkpoint to file atomically
    async fn write_file(&self) -> Result<(), Error> {
        let mut state_guard = self.state.write().await;

        let file = CheckpointFileFormat {
            version: CHECKPOINT_FILE_VERSION.to_string(),
            checkpoint: state_guard.checkpoint.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::checkpoint(format!("Failed to serialize checkpoint: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::checkpoint(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::checkpoint(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.sync_all().await.map_err(|e| {
                Error::checkpoint(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create checkpoint backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::checkpoint(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state_guard.dirty = false;

        tracing::trace!("Checkpoint written to file: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// The full saved record, including when it was saved
    pub async fn record(&self) -> Option<CheckpointRecord> {
        self.state.read().await.checkpoint.clone()
    }
}

/// Distinguishes corruption (recoverable from backup) from I/O failures
enum LoadError {
    Corrupted(Error),
    Io(Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Corrupted(e) | LoadError::Io(e) => write!(f, "{}", e),
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Option<String>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .checkpoint
            .as_ref()
            .map(|c| c.resource_version.clone()))
    }

    async fn save(&self, resource_version: &str) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard.checkpoint = Some(CheckpointRecord::new(resource_version));
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_file().await
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_file().await
        } else {
            Ok(())
        }
    }
}
