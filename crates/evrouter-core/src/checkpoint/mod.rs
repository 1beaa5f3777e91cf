// # Checkpoint Persistence
//
// Store implementations plus the bridge between the router's synchronous
// checkpoint callback and an async `CheckpointStore`.
//
// The callback runs while the router holds its cursor lock, so it must not
// block. `CheckpointWriter` only publishes the token into a watch channel;
// a background task saves whatever is newest. Intermediate tokens may be
// coalesced, the last one never is.

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use crate::config::CheckpointConfig;
use crate::error::{Error, Result};
use crate::traits::CheckpointStore;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Open the store described by `config`
pub async fn open_checkpoint_store(config: &CheckpointConfig) -> Result<Arc<dyn CheckpointStore>> {
    config.validate()?;

    match config {
        CheckpointConfig::Memory => Ok(Arc::new(MemoryCheckpointStore::new())),
        CheckpointConfig::File { path } => Ok(Arc::new(FileCheckpointStore::new(path).await?)),
    }
}

/// Background writer feeding router checkpoints into a store
pub struct CheckpointWriter {
    tx: Arc<watch::Sender<Option<String>>>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl CheckpointWriter {
    /// Spawn the writer task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn CheckpointStore>) -> Self {
        let (tx, rx) = watch::channel(None);
        let (stop_tx, stop_rx) = oneshot::channel();

        let handle = tokio::spawn(write_loop(store, rx, stop_rx));

        Self {
            tx: Arc::new(tx),
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Callback suitable for [`crate::EventRouter::with_checkpoint()`]
    pub fn callback(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let tx = Arc::clone(&self.tx);
        move |token: &str| {
            tx.send_replace(Some(token.to_string()));
        }
    }

    /// Stop the writer, saving the newest pending token and flushing
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) => Err(Error::checkpoint(format!("Checkpoint writer task failed: {}", e))),
        }
    }
}

async fn write_loop(
    store: Arc<dyn CheckpointStore>,
    mut rx: watch::Receiver<Option<String>>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                save_latest(store.as_ref(), &mut rx).await;
            }

            _ = &mut stop_rx => break,
        }
    }

    // Anything published after the last wakeup
    if rx.has_changed().unwrap_or(false) {
        save_latest(store.as_ref(), &mut rx).await;
    }

    store.flush().await
}

async fn save_latest(store: &dyn CheckpointStore, rx: &mut watch::Receiver<Option<String>>) {
    let token = rx.borrow_and_update().clone();
    let Some(token) = token else {
        return;
    };

    if let Err(e) = store.save(&token).await {
        tracing::warn!("Failed to persist checkpoint {}: {}", token, e);
    } else {
        tracing::trace!("Checkpoint saved: {}", token);
    }
}
