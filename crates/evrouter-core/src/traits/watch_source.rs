// # Watch Source Trait
//
// Defines the interface for the collaborator that observes the platform's
// event collection and reports changes.
//
// ## Implementations
//
// - Line-delimited JSON watch stream: `evrouter-watch-jsonl` crate
//
// Caching, relisting and resynchronization are the watch source's business.
// The router only sees the resulting stream of notifications.

use std::pin::Pin;
use tokio_stream::Stream;

/// Raw notification payload as received from the platform
///
/// Payloads stay untyped until the router decodes them, so a payload that is
/// not an event record can be detected and dropped.
pub type Payload = serde_json::Value;

/// A change to the observed event collection
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotification {
    /// A record appeared
    Created(Payload),
    /// A record changed
    Updated {
        /// The previous state (may be `null` if the source has none)
        old: Payload,
        /// The new state
        new: Payload,
    },
    /// A record was removed
    Deleted(Payload),
}

impl ChangeNotification {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeNotification::Created(_) => "create",
            ChangeNotification::Updated { .. } => "update",
            ChangeNotification::Deleted(_) => "delete",
        }
    }
}

/// Trait for watch source implementations
///
/// # Ordering
///
/// Notifications for a single record must be yielded in the order the
/// platform produced them. Ordering across records is not guaranteed.
pub trait WatchSource: Send + Sync {
    /// Watch for changes
    ///
    /// Returns a stream of notifications. The stream ends when the
    /// underlying source is exhausted; dropping it releases resources.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = ChangeNotification> + Send + 'static>>;
}
