//! Destination-agnostic envelope
//!
//! Every admitted notification is turned into one [`EventData`] and handed
//! to exactly one destination call. The wire form is:
//!
//! ```json
//! { "verb": "ADDED" | "UPDATED", "event": { ... }, "oldEvent": { ... } }
//! ```
//!
//! `oldEvent` is omitted when there is no previous record.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Added,
    Updated,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Added => f.write_str("ADDED"),
            Verb::Updated => f.write_str("UPDATED"),
        }
    }
}

/// The normalized outbound unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub verb: Verb,
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_event: Option<Event>,
}

impl EventData {
    /// Envelope for a newly created record
    pub fn added(event: Event) -> Self {
        Self {
            verb: Verb::Added,
            event,
            old_event: None,
        }
    }

    /// Envelope for an updated record
    pub fn updated(event: Event, old_event: Option<Event>) -> Self {
        Self {
            verb: Verb::Updated,
            event,
            old_event,
        }
    }

    /// Serialize to a single-line JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
