//! Change router
//!
//! The EventRouter is responsible for:
//! - Decoding change notifications and dropping malformed ones
//! - Admitting only notifications newer than the position cursor
//! - Building the envelope and delivering it to the destination
//! - Advancing the cursor and reporting the new checkpoint
//! - Counting deliveries when metrics are enabled
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ WatchSource │─── ChangeNotification ───┐
//! └─────────────┘                          │
//!                                          ▼
//!                                 ┌──────────────┐
//!                                 │ EventRouter  │
//!                                 └──────────────┘
//!                                          │
//!         ┌──────────────────┬─────────────┼──────────────┬──────────────────┐
//!         │                  │             │              │                  │
//!         ▼                  ▼             ▼              ▼                  ▼
//! ┌──────────────┐  ┌──────────────┐  ┌────────────┐  ┌──────────────┐  ┌──────────┐
//! │PositionCursor│  │ Destination  │  │ Checkpoint │  │DeliveryCount.│  │  Events  │
//! │ (admit)      │  │ (deliver)    │  │ (callback) │  │ (record)     │  │ (notify) │
//! └──────────────┘  └──────────────┘  └────────────┘  └──────────────┘  └──────────┘
//! ```
//!
//! ## Notification Flow
//!
//! 1. Decode payload; malformed → log, drop
//! 2. Lock cursor, test admission; stale or unpositioned → drop
//! 3. Deliver envelope (awaited, result not inspected)
//! 4. Advance cursor, invoke checkpoint callback, unlock
//! 5. Record delivery counters
//!
//! Deletions stop after step 1: they are logged and never forwarded.

use crate::config::RouterConfig;
use crate::cursor::PositionCursor;
use crate::envelope::{EventData, Verb};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::metrics::DeliveryCounters;
use crate::traits::{ChangeNotification, Destination, Payload, WatchSource};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Callback invoked with the new position token after every advance
pub type CheckpointFn = Box<dyn Fn(&str) + Send + Sync>;

/// Events emitted by the EventRouter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// Run loop started
    Started,

    /// Envelope delivered and cursor advanced
    Forwarded {
        verb: Verb,
        name: String,
        namespace: String,
        resource_version: String,
    },

    /// Notification was not newer than the cursor (or had no token)
    Skipped {
        resource_version: String,
        position: Option<String>,
    },

    /// Notification payload was malformed
    Rejected {
        notification: &'static str,
        error: String,
    },

    /// Deletion observed (never forwarded)
    Deleted {
        name: String,
        namespace: String,
    },

    /// Run loop stopped
    Stopped {
        reason: String,
    },
}

/// Core change router
///
/// ## Lifecycle
///
/// 1. Create with [`EventRouter::new()`]
/// 2. Optionally resume with [`EventRouter::resume_from()`] and attach a
///    checkpoint callback with [`EventRouter::with_checkpoint()`]
/// 3. Feed notifications through the `on_*` handlers, or hand a
///    [`WatchSource`] to [`EventRouter::run_with_shutdown()`]
///
/// ## Threading
///
/// Handlers may be called concurrently. The cursor is locked for the whole
/// admit → deliver → advance sequence, so one position token is delivered
/// at most once and deliveries are serialized.
pub struct EventRouter {
    /// Destination receiving envelopes
    destination: Box<dyn Destination>,

    /// Last forwarded position
    cursor: Mutex<PositionCursor>,

    /// Position reporting
    checkpoint: CheckpointFn,

    /// Delivery counters (metrics enabled iff present)
    counters: Option<Arc<DeliveryCounters>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<RouterEvent>,
}

impl EventRouter {
    /// Create a new router
    ///
    /// The cursor starts unset and the checkpoint callback does nothing.
    /// When `config.enable_metrics` is set, a fresh [`DeliveryCounters`] is
    /// created; use [`EventRouter::with_counters()`] to share one instead.
    ///
    /// # Returns
    ///
    /// A tuple of (router, event_receiver) where event_receiver yields router events
    pub fn new(
        destination: Box<dyn Destination>,
        config: &RouterConfig,
    ) -> Result<(Self, mpsc::Receiver<RouterEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let router = Self {
            destination,
            cursor: Mutex::new(PositionCursor::new(config.token_ordering)),
            checkpoint: Box::new(|_| {}),
            counters: config
                .enable_metrics
                .then(|| Arc::new(DeliveryCounters::new())),
            event_tx: tx,
        };

        Ok((router, rx))
    }

    /// Resume from a previously persisted position token
    pub fn resume_from(mut self, checkpoint: impl Into<String>) -> Self {
        let cursor = self.cursor.get_mut();
        *cursor = PositionCursor::resume(checkpoint, cursor.ordering());
        self
    }

    /// Set the checkpoint callback
    pub fn with_checkpoint(mut self, checkpoint: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.checkpoint = Box::new(checkpoint);
        self
    }

    /// Use shared delivery counters (enables metrics)
    pub fn with_counters(mut self, counters: Arc<DeliveryCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Delivery counters, if metrics are enabled
    pub fn counters(&self) -> Option<&Arc<DeliveryCounters>> {
        self.counters.as_ref()
    }

    /// Current cursor position
    pub async fn position(&self) -> Option<String> {
        self.cursor.lock().await.position().map(str::to_string)
    }

    /// Handle a creation notification
    pub async fn on_create(&self, payload: &Payload) {
        let event = match Event::from_payload(payload) {
            Ok(event) => event,
            Err(e) => return self.reject("create", e),
        };

        self.route(EventData::added(event)).await;
    }

    /// Handle an update notification
    ///
    /// Admission is decided by the new record's token. An absent (`null`)
    /// old record is allowed; a present but malformed one rejects the update.
    pub async fn on_update(&self, old: &Payload, new: &Payload) {
        let event = match Event::from_payload(new) {
            Ok(event) => event,
            Err(e) => return self.reject("update", e),
        };

        let old_event = if old.is_null() {
            None
        } else {
            match Event::from_payload(old) {
                Ok(old_event) => Some(old_event),
                Err(e) => return self.reject("update", e),
            }
        };

        self.route(EventData::updated(event, old_event)).await;
    }

    /// Handle a deletion notification
    ///
    /// Deletions are only logged. Downstream systems keep historical
    /// records, so nothing is forwarded and the cursor does not move.
    pub fn on_delete(&self, payload: &Payload) {
        match Event::from_payload(payload) {
            Ok(event) => {
                info!(
                    name = %event.metadata.name,
                    namespace = %event.metadata.namespace,
                    reason = %event.reason,
                    "Event deleted from the system"
                );
                self.emit_event(RouterEvent::Deleted {
                    name: event.metadata.name,
                    namespace: event.metadata.namespace,
                });
            }
            Err(e) => {
                warn!("Ignoring malformed delete notification: {}", e);
            }
        }
    }

    /// Route one notification to the matching handler
    pub async fn dispatch(&self, notification: ChangeNotification) {
        match notification {
            ChangeNotification::Created(payload) => self.on_create(&payload).await,
            ChangeNotification::Updated { old, new } => self.on_update(&old, &new).await,
            ChangeNotification::Deleted(payload) => self.on_delete(&payload),
        }
    }

    /// Admit, deliver, advance
    ///
    /// Returns `true` if the envelope was delivered.
    async fn route(&self, data: EventData) -> bool {
        let token = data.event.resource_version().to_string();

        {
            let mut cursor = self.cursor.lock().await;

            if !cursor.admit(&token) {
                debug!(
                    "Skipping event {}/{} at {:?} (cursor at {:?})",
                    data.event.metadata.namespace,
                    data.event.metadata.name,
                    token,
                    cursor.position()
                );
                self.emit_event(RouterEvent::Skipped {
                    resource_version: token,
                    position: cursor.position().map(str::to_string),
                });
                return false;
            }

            self.destination.deliver(&data).await;

            cursor.advance(&token);
            (self.checkpoint)(&token);
        }

        if let Some(counters) = &self.counters {
            counters.record(Some(&data.event));
        }

        debug!(
            "Forwarded {} {}/{} at {} to {}",
            data.verb,
            data.event.metadata.namespace,
            data.event.metadata.name,
            token,
            self.destination.name()
        );
        self.emit_event(RouterEvent::Forwarded {
            verb: data.verb,
            name: data.event.metadata.name,
            namespace: data.event.metadata.namespace,
            resource_version: token,
        });

        true
    }

    fn reject(&self, notification: &'static str, error: Error) {
        warn!("Dropping malformed {} notification: {}", notification, error);
        self.emit_event(RouterEvent::Rejected {
            notification,
            error: error.to_string(),
        });
    }

    /// Run the router until Ctrl-C
    ///
    /// Consumes the source's notification stream until a shutdown signal
    /// is received or the stream ends.
    pub async fn run(&self, source: &dyn WatchSource) -> Result<()> {
        self.run_internal(source, None).await
    }

    /// Run the router with an explicit shutdown signal
    ///
    /// Used by the daemon (which owns signal handling) and by tests.
    pub async fn run_with_shutdown(
        &self,
        source: &dyn WatchSource,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        self.run_internal(source, Some(shutdown_rx)).await
    }

    async fn run_internal(
        &self,
        source: &dyn WatchSource,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(RouterEvent::Started);
        info!("Routing events to {}", self.destination.name());

        let mut stream = source.watch();

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        // A notification already being dispatched finishes before the
        // shutdown branch is polled again.
        let reason = loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(notification) => self.dispatch(notification).await,
                    None => break "Watch stream ended",
                },

                _ = &mut shutdown => break "Shutdown signal",
            }
        };

        info!("Router stopped: {}", reason);
        self.emit_event(RouterEvent::Stopped {
            reason: reason.to_string(),
        });

        Ok(())
    }

    /// Emit a router event
    fn emit_event(&self, event: RouterEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Router event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
