//! Delivery counters
//!
//! Four counter families, one per event category, each dimensioned by the
//! subject and origin of the event. Increments go through the `metrics`
//! facade into a recorder owned by [`DeliveryCounters`], never the process
//! global one, so every router gets its own counters.
//!
//! The default recorder is a Prometheus recorder; [`DeliveryCounters::render`]
//! returns its text exposition for whatever exporter pulls it.

use crate::event::{Category, Event};
use metrics::{Recorder, counter, describe_counter, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Label set a counter is dimensioned by
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterLabels {
    pub involved_object_kind: String,
    pub involved_object_name: String,
    pub involved_object_namespace: String,
    pub reason: String,
    pub source: String,
}

impl CounterLabels {
    /// Labels for an event
    pub fn from_event(event: &Event) -> Self {
        Self {
            involved_object_kind: event.involved_object.kind.clone(),
            involved_object_name: event.involved_object.name.clone(),
            involved_object_namespace: event.involved_object.namespace.clone(),
            reason: event.reason.clone(),
            source: event.source.host.clone(),
        }
    }

    /// Label names and values, in exposition order
    pub fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("involved_object_kind", &self.involved_object_kind),
            ("involved_object_name", &self.involved_object_name),
            ("involved_object_namespace", &self.involved_object_namespace),
            ("reason", &self.reason),
            ("source", &self.source),
        ]
    }
}

/// Delivery counters keyed by category and labels
pub struct DeliveryCounters {
    recorder: Box<dyn Recorder + Send + Sync>,
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for DeliveryCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryCounters")
            .field("prometheus", &self.handle.is_some())
            .finish()
    }
}

impl Default for DeliveryCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryCounters {
    /// Create counters backed by a private Prometheus recorder
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self::build(Box::new(recorder), Some(handle))
    }

    /// Create counters that record into `recorder`
    ///
    /// [`render`](Self::render) returns an empty string for these; read the
    /// values back through the recorder itself.
    pub fn with_recorder(recorder: impl Recorder + Send + Sync + 'static) -> Self {
        Self::build(Box::new(recorder), None)
    }

    fn build(recorder: Box<dyn Recorder + Send + Sync>, handle: Option<PrometheusHandle>) -> Self {
        let counters = Self { recorder, handle };
        with_local_recorder(&*counters.recorder, || {
            for category in Category::ALL {
                describe_counter!(
                    category.metric_name(),
                    format!("Total number of {} events routed", category)
                );
            }
        });
        counters
    }

    /// Count one delivered event
    ///
    /// `None` is a no-op.
    pub fn record(&self, event: Option<&Event>) {
        let Some(event) = event else {
            return;
        };

        let labels = CounterLabels::from_event(event);
        with_local_recorder(&*self.recorder, || {
            counter!(
                event.category().metric_name(),
                "involved_object_kind" => labels.involved_object_kind,
                "involved_object_name" => labels.involved_object_name,
                "involved_object_namespace" => labels.involved_object_namespace,
                "reason" => labels.reason,
                "source" => labels.source
            )
            .increment(1);
        });
    }

    /// Render all counters in Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }
}
