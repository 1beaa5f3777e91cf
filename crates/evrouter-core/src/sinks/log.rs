// # Structured Log Destination
//
// Emits one `tracing` record per envelope under the `evrouter::events`
// target, with the event's identity and classification as fields. Whatever
// subscriber the process installs decides the final format.

use crate::config::DestinationConfig;
use crate::envelope::EventData;
use crate::error::{Error, Result};
use crate::traits::{Destination, DestinationFactory};
use async_trait::async_trait;

/// Structured log destination
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl Destination for LogSink {
    async fn deliver(&self, data: &EventData) {
        let event = &data.event;
        tracing::info!(
            target: "evrouter::events",
            verb = %data.verb,
            name = %event.metadata.name,
            namespace = %event.metadata.namespace,
            resource_version = %event.metadata.resource_version,
            event_type = %event.type_,
            reason = %event.reason,
            count = event.count,
            involved_object_kind = %event.involved_object.kind,
            involved_object_name = %event.involved_object.name,
            source_host = %event.source.host,
            old_resource_version = data.old_event.as_ref().map(|old| old.metadata.resource_version.as_str()),
            "{}",
            event.message
        );
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Factory for creating log destinations
pub struct LogSinkFactory;

impl DestinationFactory for LogSinkFactory {
    fn create(&self, config: &DestinationConfig) -> Result<Box<dyn Destination>> {
        match config {
            DestinationConfig::Log => Ok(Box::new(LogSink)),
            _ => Err(Error::config("Invalid config for log destination")),
        }
    }
}
