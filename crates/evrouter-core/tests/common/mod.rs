//! Test doubles and common utilities for router contract tests
//!
//! This module provides minimal test doubles that verify routing
//! constraints without real sources or sinks.

#![allow(dead_code)]

use evrouter_core::event::{Category, Event, ObjectReference};
use evrouter_core::metrics::CounterLabels;
use evrouter_core::traits::{ChangeNotification, Destination, Payload, WatchSource};
use evrouter_core::{DeliveryCounters, EventData, EventRouter, RouterConfig, RouterEvent};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// A controlled WatchSource that emits notifications on demand
pub struct ControlledWatchSource {
    /// Receiver for the router's watch stream
    router_rx: Arc<std::sync::Mutex<Option<mpsc::UnboundedReceiver<ChangeNotification>>>>,
    /// Call counter for watch()
    watch_call_count: Arc<AtomicUsize>,
}

impl ControlledWatchSource {
    /// Create a new controlled source and the sender that feeds it
    pub fn new() -> (Self, mpsc::UnboundedSender<ChangeNotification>) {
        let (test_tx, router_rx) = mpsc::unbounded_channel();

        let source = Self {
            router_rx: Arc::new(std::sync::Mutex::new(Some(router_rx))),
            watch_call_count: Arc::new(AtomicUsize::new(0)),
        };

        (source, test_tx)
    }

    /// Get the number of times watch() was called
    pub fn watch_call_count(&self) -> usize {
        self.watch_call_count.load(Ordering::SeqCst)
    }
}

impl WatchSource for ControlledWatchSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = ChangeNotification> + Send + 'static>> {
        self.watch_call_count.fetch_add(1, Ordering::SeqCst);

        // Take the receiver (only called once)
        let rx = self
            .router_rx
            .lock()
            .unwrap()
            .take()
            .expect("watch() can only be called once");

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

/// A watch source that never emits notifications (for idle testing)
pub struct IdleWatchSource {
    /// Keeps the channel open so the stream never ends
    _tx: mpsc::UnboundedSender<ChangeNotification>,
    rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<ChangeNotification>>>,
}

impl IdleWatchSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            _tx: tx,
            rx: std::sync::Mutex::new(Some(rx)),
        }
    }
}

impl WatchSource for IdleWatchSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = ChangeNotification> + Send + 'static>> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("watch() can only be called once");
        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

/// A finite watch source that replays a fixed list, then ends
pub struct ScriptedWatchSource {
    notifications: Vec<ChangeNotification>,
}

impl ScriptedWatchSource {
    pub fn new(notifications: Vec<ChangeNotification>) -> Self {
        Self { notifications }
    }
}

impl WatchSource for ScriptedWatchSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = ChangeNotification> + Send + 'static>> {
        Box::pin(tokio_stream::iter(self.notifications.clone()))
    }
}

/// A mock Destination that records every envelope
pub struct MockDestination {
    /// Call counter for deliver()
    deliver_call_count: Arc<AtomicUsize>,
    /// Recorded envelopes
    delivered: Arc<std::sync::Mutex<Vec<EventData>>>,
    /// Artificial delivery latency
    delay: Duration,
}

impl MockDestination {
    pub fn new() -> Self {
        Self {
            deliver_call_count: Arc::new(AtomicUsize::new(0)),
            delivered: Arc::new(std::sync::Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    /// Make every delivery take `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of times deliver() was called
    pub fn deliver_call_count(&self) -> usize {
        self.deliver_call_count.load(Ordering::SeqCst)
    }

    /// Get the envelopes delivered so far
    pub fn delivered(&self) -> Vec<EventData> {
        self.delivered.lock().unwrap().clone()
    }

    /// Create a new MockDestination that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            deliver_call_count: Arc::clone(&other.deliver_call_count),
            delivered: Arc::clone(&other.delivered),
            delay: other.delay,
        }
    }
}

#[async_trait::async_trait]
impl Destination for MockDestination {
    async fn deliver(&self, data: &EventData) {
        self.deliver_call_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.delivered.lock().unwrap().push(data.clone());
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Records every token passed to the checkpoint callback
#[derive(Clone, Default)]
pub struct CheckpointRecorder {
    tokens: Arc<std::sync::Mutex<Vec<String>>>,
}

impl CheckpointRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to hand to `EventRouter::with_checkpoint`
    pub fn callback(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let tokens = Arc::clone(&self.tokens);
        move |token: &str| tokens.lock().unwrap().push(token.to_string())
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

/// Build a router around a destination sharing counters with `destination`
pub fn router_for(
    destination: &MockDestination,
) -> (EventRouter, mpsc::Receiver<RouterEvent>) {
    EventRouter::new(
        Box::new(MockDestination::sharing_counters_with(destination)),
        &RouterConfig::new(),
    )
    .expect("router construction succeeds")
}

/// A Normal event payload
pub fn event_payload(name: &str, resource_version: &str) -> Payload {
    Event::new(name, "default", resource_version)
        .with_type("Normal")
        .with_reason("Scheduled", "Successfully assigned pod")
        .to_payload()
}

/// An event payload of the given type
pub fn typed_payload(name: &str, resource_version: &str, event_type: &str) -> Payload {
    Event::new(name, "default", resource_version)
        .with_type(event_type)
        .with_reason("BackOff", "Back-off restarting failed container")
        .with_involved_object(ObjectReference {
            kind: "Pod".to_string(),
            name: name.to_string(),
            namespace: "default".to_string(),
            ..ObjectReference::default()
        })
        .with_source("kubelet", "node-1")
        .to_payload()
}

/// Drain all currently queued router events
pub fn drain_events(rx: &mut mpsc::Receiver<RouterEvent>) -> Vec<RouterEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Read-back side of delivery counters recorded into a debugging recorder
pub struct CounterReader {
    snapshotter: Snapshotter,
}

impl CounterReader {
    /// Create counters and the reader observing them
    pub fn new() -> (Arc<DeliveryCounters>, Self) {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        (
            Arc::new(DeliveryCounters::with_recorder(recorder)),
            Self { snapshotter },
        )
    }

    /// Every counter as (family, labels, value)
    pub fn values(&self) -> Vec<(String, CounterLabels, u64)> {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| {
                let DebugValue::Counter(value) = value else {
                    return None;
                };
                let key = key.key();
                let label = |name: &str| {
                    key.labels()
                        .find(|label| label.key() == name)
                        .map(|label| label.value().to_string())
                        .unwrap_or_default()
                };
                let labels = CounterLabels {
                    involved_object_kind: label("involved_object_kind"),
                    involved_object_name: label("involved_object_name"),
                    involved_object_namespace: label("involved_object_namespace"),
                    reason: label("reason"),
                    source: label("source"),
                };
                Some((key.name().to_string(), labels, value))
            })
            .collect()
    }

    /// Value of one counter
    pub fn get(&self, category: Category, labels: &CounterLabels) -> u64 {
        self.values()
            .into_iter()
            .filter(|(name, l, _)| name == category.metric_name() && l == labels)
            .map(|(_, _, value)| value)
            .sum()
    }

    /// Sum of one counter family across all labels
    pub fn total(&self, category: Category) -> u64 {
        self.values()
            .into_iter()
            .filter(|(name, _, _)| name == category.metric_name())
            .map(|(_, _, value)| value)
            .sum()
    }
}
