//! Event record data model
//!
//! The shape mirrors the JSON the resource-management platform emits for
//! its event objects (camelCase keys). Every field is optional on the wire:
//! absent keys take their defaults, unknown keys are ignored. A key that is
//! present with the wrong type makes the whole payload malformed.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity and position of an event record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    /// Opaque, source-assigned position token
    pub resource_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

/// The subject an event is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectReference {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub api_version: String,
    pub uid: String,
}

/// The component that reported an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSource {
    pub component: String,
    pub host: String,
}

/// A single event record as observed from the platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    pub metadata: ObjectMeta,

    /// Category used for metrics ("Warning", "Normal", ...)
    #[serde(rename = "type")]
    pub type_: String,

    pub reason: String,
    pub message: String,

    /// Number of times this event has occurred
    pub count: i32,

    pub involved_object: ObjectReference,
    pub source: EventSource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl Event {
    /// Create an event with the given identity and position token
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        resource_version: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                resource_version: resource_version.into(),
                uid: String::new(),
            },
            ..Self::default()
        }
    }

    /// Set the category
    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = type_.into();
        self
    }

    /// Set the reason and message
    pub fn with_reason(mut self, reason: impl Into<String>, message: impl Into<String>) -> Self {
        self.reason = reason.into();
        self.message = message.into();
        self
    }

    /// Set the subject reference
    pub fn with_involved_object(mut self, involved_object: ObjectReference) -> Self {
        self.involved_object = involved_object;
        self
    }

    /// Set the origin host and component
    pub fn with_source(mut self, component: impl Into<String>, host: impl Into<String>) -> Self {
        self.source = EventSource {
            component: component.into(),
            host: host.into(),
        };
        self
    }

    /// Decode a raw notification payload
    ///
    /// Returns `Error::MalformedNotification` when the payload is absent
    /// (`null`), is not a JSON object, or has fields of the wrong type.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        match payload {
            serde_json::Value::Null => Err(Error::malformed("payload is absent")),
            serde_json::Value::Object(_) => serde_json::from_value(payload.clone())
                .map_err(|e| Error::malformed(format!("payload is not an event record: {}", e))),
            other => Err(Error::malformed(format!(
                "payload is not an event record: expected object, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Encode this event as a raw notification payload
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// The position token of this record
    pub fn resource_version(&self) -> &str {
        &self.metadata.resource_version
    }

    /// The metrics category of this record
    pub fn category(&self) -> Category {
        Category::from_type(&self.type_)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Event category, as used for delivery counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Warning,
    Normal,
    Info,
    Unknown,
}

impl Category {
    /// All categories, in reporting order
    pub const ALL: [Category; 4] = [
        Category::Warning,
        Category::Normal,
        Category::Info,
        Category::Unknown,
    ];

    /// Classify an event `type` string (case-sensitive)
    pub fn from_type(type_: &str) -> Self {
        match type_ {
            "Warning" => Category::Warning,
            "Normal" => Category::Normal,
            "Info" => Category::Info,
            _ => Category::Unknown,
        }
    }

    /// Counter family name for this category
    pub fn metric_name(&self) -> &'static str {
        match self {
            Category::Warning => "evrouter_warnings_total",
            Category::Normal => "evrouter_normal_total",
            Category::Info => "evrouter_info_total",
            Category::Unknown => "evrouter_unknown_total",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Warning => "warnings",
            Category::Normal => "normal",
            Category::Info => "info",
            Category::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
