// # Stdout Destination
//
// Writes one JSON envelope per line to standard output, for collection by
// whatever ships the process's output (container log drivers, journald).
//
// With a JSON namespace configured, each line is wrapped:
//
// ```json
// {"kubernetes": {"verb": "ADDED", "event": {...}}}
// ```

use crate::config::DestinationConfig;
use crate::envelope::EventData;
use crate::error::{Error, Result};
use crate::traits::{Destination, DestinationFactory};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Standard output destination
pub struct StdoutSink {
    namespace: Option<String>,

    /// Held for a whole line so concurrent envelopes never interleave
    out: Mutex<BoxedWriter>,
}

impl std::fmt::Debug for StdoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutSink")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl StdoutSink {
    /// Create a stdout destination, optionally wrapping lines under `namespace`
    pub fn new(namespace: Option<String>) -> Self {
        Self::with_writer(namespace, tokio::io::stdout())
    }

    /// Create a destination writing its lines to `writer` instead of stdout
    pub fn with_writer(
        namespace: Option<String>,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
            out: Mutex::new(Box::new(writer)),
        }
    }

    /// The wrapping key, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Render the line written for `data` (without the newline)
    pub fn render(&self, data: &EventData) -> Result<String> {
        let line = match &self.namespace {
            Some(namespace) => {
                let mut wrapper = serde_json::Map::new();
                wrapper.insert(namespace.clone(), serde_json::to_value(data)?);
                serde_json::to_string(&wrapper)?
            }
            None => serde_json::to_string(data)?,
        };
        Ok(line)
    }
}

#[async_trait]
impl Destination for StdoutSink {
    async fn deliver(&self, data: &EventData) {
        let line = match self.render(data) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to serialize event: {}", e);
                return;
            }
        };

        let mut buf = line.into_bytes();
        buf.push(b'\n');

        let mut out = self.out.lock().await;
        if let Err(e) = write_line(&mut *out, &buf).await {
            tracing::error!("Failed to write event to stdout: {}", e);
        }
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

async fn write_line(out: &mut BoxedWriter, buf: &[u8]) -> std::io::Result<()> {
    out.write_all(buf).await?;
    out.flush().await
}

/// Factory for creating stdout destinations
pub struct StdoutSinkFactory;

impl DestinationFactory for StdoutSinkFactory {
    fn create(&self, config: &DestinationConfig) -> Result<Box<dyn Destination>> {
        match config {
            DestinationConfig::Stdout { json_namespace } => {
                Ok(Box::new(StdoutSink::new(json_namespace.clone())))
            }
            _ => Err(Error::config("Invalid config for stdout destination")),
        }
    }
}
