// # Destination Trait
//
// Defines the interface for consumers of routed event envelopes.
//
// ## Implementations
//
// - Stdout, structured log, file appender: `evrouter_core::sinks`
// - HTTP poster: `evrouter-sink-http` crate
//
// ## Usage
//
// ```rust,ignore
// use evrouter_core::{Destination, EventData};
//
// let destination = /* Destination implementation */;
// destination.deliver(&EventData::added(event)).await;
// ```

use crate::envelope::EventData;
use async_trait::async_trait;

/// Trait for destination implementations
///
/// A destination receives each admitted envelope exactly once. The call is
/// awaited by the router, so a slow destination stalls that dispatch path,
/// but nothing is returned: delivery is fire-and-forget.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Failure Reporting
///
/// A destination that fails to deliver must report it through its own
/// channel (an `error!` log line) and return normally. It must not panic,
/// retry, or spawn tasks to retry later.
///
/// ✅ **CORRECT**: log and return
/// ```rust,ignore
/// async fn deliver(&self, data: &EventData) {
///     if let Err(e) = self.client.post(&self.url).json(data).send().await {
///         tracing::error!("Failed to post event: {}", e);
///     }
/// }
/// ```
///
/// ❌ **WRONG**: retry loop inside the destination
/// ```rust,ignore
/// async fn deliver(&self, data: &EventData) {
///     while self.client.post(&self.url).json(data).send().await.is_err() {
///         tokio::time::sleep(Duration::from_secs(1)).await; // WRONG!
///     }
/// }
/// ```
#[async_trait]
pub trait Destination: Send + Sync {
    /// Deliver one envelope
    ///
    /// `data.event` is the new record; `data.old_event` is the previous
    /// record for updates.
    async fn deliver(&self, data: &EventData);

    /// Get the destination name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// Helper trait for constructing destinations from configuration
pub trait DestinationFactory: Send + Sync {
    /// Create a Destination instance from configuration
    ///
    /// Failing here is a startup configuration failure.
    fn create(
        &self,
        config: &crate::config::DestinationConfig,
    ) -> Result<Box<dyn Destination>, crate::Error>;
}
