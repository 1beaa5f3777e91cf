// # JSON Lines Watch Source
//
// This crate provides a watch source that reads change notifications as
// line-delimited JSON, the shape a platform watch stream (or a captured
// one) produces:
//
// ```json
// {"type": "ADDED", "object": {"metadata": {"name": "...", "resourceVersion": "..."}, ...}}
// {"type": "MODIFIED", "object": {...}}
// {"type": "DELETED", "object": {...}}
// ```
//
// ## Purpose
//
// - Run the router against `kubectl get events --watch -o json` style output
// - Replay captured streams for debugging
// - Feed the daemon from a file or stdin in CI
//
// ## Old Records
//
// Watch lines only carry the current object. The source keeps the last
// object seen per (namespace, name) so that MODIFIED lines can be delivered
// with the previous record. A MODIFIED line for an unseen object carries no
// old record.
//
// Unparseable lines, including lines that are not UTF-8, are logged and
// skipped; they never stop the stream.
//
// Decoded notifications pass through a bounded channel. When the router
// falls behind, the reader stops reading until there is room again.

use evrouter_core::traits::{ChangeNotification, Payload, WatchSource};
use evrouter_core::{Error, Result};

use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Default number of decoded notifications buffered ahead of the router
const DEFAULT_CAPACITY: usize = 256;

/// One decoded watch line
#[derive(Debug, Deserialize)]
struct WatchLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: Payload,
}

/// Turns watch lines into change notifications
///
/// Holds the per-object cache used to pair MODIFIED lines with the
/// previous record.
#[derive(Debug, Default)]
pub struct LineDecoder {
    last_seen: HashMap<(String, String), Payload>,
}

impl LineDecoder {
    /// Create a decoder with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently cached
    pub fn cached(&self) -> usize {
        self.last_seen.len()
    }

    /// Decode one line
    ///
    /// # Returns
    ///
    /// - `Ok(Some(notification))`: A change to forward
    /// - `Ok(None)`: A blank line or a line type with no notification (e.g. BOOKMARK)
    /// - `Err(Error)`: The line is not a watch record
    pub fn decode(&mut self, line: &str) -> Result<Option<ChangeNotification>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let watch_line: WatchLine = serde_json::from_str(line)
            .map_err(|e| Error::watch_source(format!("Invalid watch line: {}", e)))?;

        let key = object_key(&watch_line.object);

        let notification = match watch_line.kind.as_str() {
            "ADDED" => {
                if let Some(key) = key {
                    self.last_seen.insert(key, watch_line.object.clone());
                }
                ChangeNotification::Created(watch_line.object)
            }
            "MODIFIED" => {
                let old = match key {
                    Some(key) => self.last_seen.insert(key, watch_line.object.clone()),
                    None => None,
                };
                ChangeNotification::Updated {
                    old: old.unwrap_or(Payload::Null),
                    new: watch_line.object,
                }
            }
            "DELETED" => {
                if let Some(key) = key {
                    self.last_seen.remove(&key);
                }
                ChangeNotification::Deleted(watch_line.object)
            }
            "BOOKMARK" => return Ok(None),
            "ERROR" => {
                return Err(Error::watch_source(format!(
                    "Watch stream reported an error: {}",
                    watch_line.object
                )));
            }
            other => {
                return Err(Error::watch_source(format!(
                    "Unknown watch line type '{}'",
                    other
                )));
            }
        };

        Ok(Some(notification))
    }
}

/// (namespace, name) of an object payload, if it has a name
fn object_key(object: &Payload) -> Option<(String, String)> {
    let metadata = object.get("metadata")?;
    let name = metadata.get("name")?.as_str()?;
    let namespace = metadata
        .get("namespace")
        .and_then(|ns| ns.as_str())
        .unwrap_or_default();
    Some((namespace.to_string(), name.to_string()))
}

/// Line-delimited JSON watch source
///
/// The reader is consumed by the first call to [`WatchSource::watch()`];
/// later calls yield an empty stream.
pub struct JsonlWatchSource {
    /// Human-readable origin, for logs
    origin: String,

    /// Notifications buffered ahead of the consumer
    capacity: usize,

    /// Reader, taken by watch()
    reader: std::sync::Mutex<Option<BoxedReader>>,
}

impl JsonlWatchSource {
    /// Create a source over any async reader
    ///
    /// # Parameters
    ///
    /// - `origin`: Name used in log messages
    /// - `reader`: Byte stream of watch lines
    pub fn new(origin: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            origin: origin.into(),
            capacity: DEFAULT_CAPACITY,
            reader: std::sync::Mutex::new(Some(Box::new(reader))),
        }
    }

    /// Set how many decoded notifications may wait for the consumer
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Read watch lines from standard input
    pub fn stdin() -> Self {
        Self::new("stdin", tokio::io::stdin())
    }

    /// Read watch lines from a file
    ///
    /// # Returns
    ///
    /// - `Ok(JsonlWatchSource)`: The file was opened
    /// - `Err(Error)`: The file cannot be opened
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            Error::watch_source(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self::new(path.display().to_string(), file))
    }

    /// Where lines are read from
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl WatchSource for JsonlWatchSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = ChangeNotification> + Send + 'static>> {
        let (tx, rx) = mpsc::channel(self.capacity);

        let reader = match self.reader.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        let Some(reader) = reader else {
            tracing::warn!("Watch source {} already consumed", self.origin);
            return Box::pin(ReceiverStream::new(rx));
        };

        let origin = self.origin.clone();

        tokio::spawn(async move {
            tracing::info!("Reading watch lines from {}", origin);

            let mut reader = BufReader::new(reader);
            let mut decoder = LineDecoder::new();
            let mut buf = Vec::new();
            let mut line_no: u64 = 0;

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => {
                        tracing::info!("End of watch input from {}", origin);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("Failed to read from {}: {}", origin, e);
                        break;
                    }
                }
                line_no += 1;

                let line = match std::str::from_utf8(&buf) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Skipping line {} of {}: not UTF-8: {}", line_no, origin, e);
                        continue;
                    }
                };

                match decoder.decode(line) {
                    Ok(Some(notification)) => {
                        if tx.send(notification).await.is_err() {
                            tracing::debug!("Receiver dropped, stopping watch of {}", origin);
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("Skipping line {} of {}: {}", line_no, origin, e);
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio_stream::StreamExt;

    fn line(kind: &str, name: &str, rv: &str) -> String {
        json!({
            "type": kind,
            "object": {
                "metadata": {"name": name, "namespace": "default", "resourceVersion": rv},
                "type": "Normal",
                "reason": "Pulled"
            }
        })
        .to_string()
    }

    #[test]
    fn test_modified_carries_previous_object() {
        let mut decoder = LineDecoder::new();

        let added = decoder.decode(&line("ADDED", "e", "1")).unwrap().unwrap();
        assert_eq!(added.kind(), "create");

        let modified = decoder.decode(&line("MODIFIED", "e", "2")).unwrap().unwrap();
        match modified {
            ChangeNotification::Updated { old, new } => {
                assert_eq!(old["metadata"]["resourceVersion"], "1");
                assert_eq!(new["metadata"]["resourceVersion"], "2");
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_modified_for_unseen_object_has_no_old() {
        let mut decoder = LineDecoder::new();

        match decoder.decode(&line("MODIFIED", "e", "9")).unwrap().unwrap() {
            ChangeNotification::Updated { old, .. } => assert!(old.is_null()),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_deleted_evicts_cache() {
        let mut decoder = LineDecoder::new();
        decoder.decode(&line("ADDED", "e", "1")).unwrap();
        assert_eq!(decoder.cached(), 1);

        let deleted = decoder.decode(&line("DELETED", "e", "2")).unwrap().unwrap();
        assert!(matches!(deleted, ChangeNotification::Deleted(_)));
        assert_eq!(decoder.cached(), 0);
    }

    #[test]
    fn test_bad_lines() {
        let mut decoder = LineDecoder::new();

        assert!(decoder.decode("").unwrap().is_none());
        assert!(decoder.decode("not json").is_err());
        assert!(decoder.decode(r#"{"type":"EXPLODED","object":{}}"#).is_err());
        assert!(decoder.decode(r#"{"type":"ERROR","object":{"code":410}}"#).is_err());
        assert!(decoder
            .decode(r#"{"type":"BOOKMARK","object":{}}"#)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_stream_skips_bad_lines_and_ends() {
        let input = format!(
            "{}\ngarbage\n{}\n{}\n",
            line("ADDED", "a", "1"),
            line("MODIFIED", "a", "2"),
            line("DELETED", "a", "3"),
        );
        let source = JsonlWatchSource::new("test", std::io::Cursor::new(input.into_bytes()));

        let kinds: Vec<&'static str> = source.watch().map(|n| n.kind()).collect().await;
        assert_eq!(kinds, vec!["create", "update", "delete"]);

        // Reader already consumed
        let again: Vec<ChangeNotification> = source.watch().collect().await;
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let mut input = Vec::new();
        input.extend_from_slice(line("ADDED", "a", "1").as_bytes());
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(line("ADDED", "b", "2").as_bytes());
        input.push(b'\n');
        let source = JsonlWatchSource::new("test", std::io::Cursor::new(input));

        let names: Vec<String> = source
            .watch()
            .map(|n| match n {
                ChangeNotification::Created(object) => object["metadata"]["name"].to_string(),
                other => panic!("expected create, got {:?}", other),
            })
            .collect()
            .await;
        assert_eq!(names, vec!["\"a\"", "\"b\""]);
    }

    #[tokio::test]
    async fn test_reader_waits_for_slow_consumer() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let source = JsonlWatchSource::new("test", reader).with_capacity(1);
        let mut stream = source.watch();

        let writer_task = tokio::spawn(async move {
            for i in 0..20 {
                let text = format!("{}\n", line("ADDED", &format!("e{}", i), &i.to_string()));
                writer.write_all(text.as_bytes()).await.unwrap();
            }
        });

        // Nothing polls the stream yet, so the pipe is not drained
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!writer_task.is_finished());

        let mut received = 0;
        while stream.next().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 20);
        writer_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = JsonlWatchSource::open("/nonexistent/evrouter/watch.jsonl").await;
        assert!(result.is_err());
    }
}
