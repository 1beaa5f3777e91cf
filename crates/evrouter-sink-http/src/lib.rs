// # HTTP Destination
//
// This crate provides an HTTP destination for the event router: every
// routed envelope is POSTed as JSON to a configured endpoint.
//
// ## Behavior
//
// - One request per routed envelope
// - HTTP timeout configured (30 seconds)
// - Specific log messages for HTTP status codes (401/403, 413, 429, 5xx)
// - Optional bearer token authentication
// - No retries: a failed delivery is logged and the envelope is dropped,
//   the router has already moved on
//
// ## Security Requirements
//
// - Bearer token NEVER appears in logs or Debug output
// - Bearer token MUST be provided via environment variables only
//
// ## Wire Format
//
// ```http
// POST <url>
// Content-Type: application/json
// Authorization: Bearer <token>   (when configured)
//
// {"verb": "UPDATED", "event": {...}, "oldEvent": {...}}
// ```

use async_trait::async_trait;
use evrouter_core::config::DestinationConfig;
use evrouter_core::envelope::EventData;
use evrouter_core::traits::{Destination, DestinationFactory};
use evrouter_core::{Error, Result};
use std::time::Duration;

/// Default HTTP timeout for requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP POST destination
///
/// # Security
///
/// The Debug implementation does NOT expose the bearer token.
pub struct HttpSink {
    /// Endpoint receiving envelopes
    url: String,

    /// Optional bearer token
    /// ⚠️ NEVER log this value
    bearer_token: Option<String>,

    /// HTTP client for requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the bearer token
impl std::fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSink")
            .field("url", &self.url)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl HttpSink {
    /// Create a new HTTP destination
    ///
    /// # Parameters
    ///
    /// - `url`: Endpoint to POST envelopes to (http or https)
    /// - `bearer_token`: Optional token sent as `Authorization: Bearer ...`
    ///
    /// # Returns
    ///
    /// - `Ok(HttpSink)`: Ready to deliver
    /// - `Err(Error)`: If the URL is empty or the HTTP client cannot be built
    pub fn new(url: impl Into<String>, bearer_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Self::with_client(url, bearer_token, client)
    }

    /// Create a new HTTP destination around a preconfigured client
    ///
    /// The client's own timeout and proxy settings are used as-is.
    pub fn with_client(
        url: impl Into<String>,
        bearer_token: Option<String>,
        client: reqwest::Client,
    ) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(Error::config("HTTP destination URL is required"));
        }

        Ok(Self {
            url,
            bearer_token: bearer_token.filter(|token| !token.is_empty()),
            client,
        })
    }

    /// The endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one envelope
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The endpoint answered with a 2xx status
    /// - `Err(Error)`: Transport failure or non-2xx status
    pub async fn post(&self, data: &EventData) -> Result<()> {
        let mut request = self.client.post(&self.url).json(data);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::destination("http", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        let message = match status.as_u16() {
            401 | 403 => format!(
                "Authentication failed: invalid or missing bearer token. Status: {}",
                status
            ),
            413 => format!("Envelope rejected as too large. Status: {}", status),
            429 => format!("Rate limit exceeded. Status: {}", status),
            500..=599 => format!("Endpoint server error: {} - {}", status, error_text),
            _ => format!("Unexpected response: {} - {}", status, error_text),
        };

        Err(Error::destination("http", message))
    }
}

#[async_trait]
impl Destination for HttpSink {
    async fn deliver(&self, data: &EventData) {
        match self.post(data).await {
            Ok(()) => {
                tracing::debug!(
                    "Posted {} {}/{} to {}",
                    data.verb,
                    data.event.metadata.namespace,
                    data.event.metadata.name,
                    self.url
                );
            }
            Err(e) => {
                tracing::error!(
                    "Dropping {} {}/{} at {}: {}",
                    data.verb,
                    data.event.metadata.namespace,
                    data.event.metadata.name,
                    data.event.metadata.resource_version,
                    e
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP destinations
pub struct HttpSinkFactory;

impl DestinationFactory for HttpSinkFactory {
    fn create(&self, config: &DestinationConfig) -> Result<Box<dyn Destination>> {
        match config {
            DestinationConfig::Http { url, bearer_token } => {
                Ok(Box::new(HttpSink::new(url.clone(), bearer_token.clone())?))
            }
            _ => Err(Error::config("Invalid config for HTTP destination")),
        }
    }
}

/// Register the HTTP destination with a registry
///
/// This function should be called during initialization to make the
/// HTTP destination available.
///
/// # Example
///
/// ```rust
/// use evrouter_core::DestinationRegistry;
///
/// let registry = DestinationRegistry::with_builtins();
/// evrouter_sink_http::register(&registry);
/// assert!(registry.has_destination("http"));
/// ```
pub fn register(registry: &evrouter_core::DestinationRegistry) {
    registry.register_destination("http", Box::new(HttpSinkFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use evrouter_core::event::Event;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one request, answer with `status`, return the raw request
    async fn serve_once(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/events", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status);
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (url, handle)
    }

    /// Sink talking to the local test server directly
    fn local_sink(url: String, bearer_token: Option<String>) -> HttpSink {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpSink::with_client(url, bearer_token, client).unwrap()
    }

    fn data() -> EventData {
        EventData::updated(
            Event::new("test-event", "default", "2").with_type("Warning"),
            Some(Event::new("test-event", "default", "1")),
        )
    }

    #[tokio::test]
    async fn test_post_sends_envelope_with_token() {
        let (url, server) = serve_once("200 OK").await;
        let sink = local_sink(url, Some("secret".to_string()));

        sink.post(&data()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /events"));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));

        let body = request.split("\r\n\r\n").nth(1).unwrap();
        let value: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["verb"], "UPDATED");
        assert_eq!(value["oldEvent"]["metadata"]["resourceVersion"], "1");
    }

    #[tokio::test]
    async fn test_post_reports_server_error() {
        let (url, server) = serve_once("503 Service Unavailable").await;
        let sink = local_sink(url, None);

        let err = sink.post(&data()).await.unwrap_err();
        assert!(err.to_string().contains("server error"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_deliver_contains_failures() {
        let (url, server) = serve_once("401 Unauthorized").await;
        let sink = local_sink(url, None);

        // Never panics, never returns an error
        sink.deliver(&data()).await;
        server.await.unwrap();
    }

    #[test]
    fn test_factory_creation() {
        let factory = HttpSinkFactory;

        let config = DestinationConfig::Http {
            url: "https://collector.local/events".to_string(),
            bearer_token: Some("token".to_string()),
        };

        let sink = factory.create(&config).unwrap();
        assert_eq!(sink.name(), "http");

        assert!(factory.create(&DestinationConfig::Log).is_err());
        assert!(factory
            .create(&DestinationConfig::Http {
                url: String::new(),
                bearer_token: None,
            })
            .is_err());
    }

    #[test]
    fn test_bearer_token_not_exposed_in_debug() {
        let sink = HttpSink::new(
            "https://collector.local/events",
            Some("secret_token_12345".to_string()),
        )
        .unwrap();

        let debug_str = format!("{:?}", sink);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("HttpSink"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_register() {
        let registry = evrouter_core::DestinationRegistry::new();
        register(&registry);
        assert!(registry.has_destination("http"));
    }
}
