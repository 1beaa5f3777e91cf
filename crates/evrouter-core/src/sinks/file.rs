// # File Destination
//
// Appends one JSON envelope per line to a file, the way blob-store sinks
// accumulate event documents. The file is opened in append mode for every
// delivery, so external rotation (rename + recreate) is picked up without a
// restart.
//
// ## Failure Handling
//
// Open and write errors are logged and the envelope is dropped. The router
// is never told.

use crate::config::DestinationConfig;
use crate::envelope::EventData;
use crate::error::{Error, Result};
use crate::traits::{Destination, DestinationFactory};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only JSON lines destination
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    /// Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl FileSink {
    /// Create a file destination writing to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// The output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Destination for FileSink {
    async fn deliver(&self, data: &EventData) {
        let line = match data.to_json() {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to serialize event: {}", e);
                return;
            }
        };

        if let Err(e) = self.append(&line).await {
            tracing::error!(
                "Failed to append event to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Factory for creating file destinations
pub struct FileSinkFactory;

impl DestinationFactory for FileSinkFactory {
    fn create(&self, config: &DestinationConfig) -> Result<Box<dyn Destination>> {
        match config {
            DestinationConfig::File { path } => {
                if path.is_empty() {
                    return Err(Error::config("File destination path is required"));
                }
                Ok(Box::new(FileSink::new(path)))
            }
            _ => Err(Error::config("Invalid config for file destination")),
        }
    }
}
