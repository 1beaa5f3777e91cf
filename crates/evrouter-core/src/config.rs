//! Configuration types for the event router
//!
//! This module defines all configuration structures used throughout the crate.

use crate::cursor::TokenOrdering;
use serde::{Deserialize, Serialize};

/// Main router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Where envelopes are delivered
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Where the position token is persisted
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Whether delivery counters are maintained
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,

    /// How position tokens are compared
    #[serde(default)]
    pub token_ordering: TokenOrdering,

    /// Capacity of the router's observability event channel
    ///
    /// When full, router events are dropped (with a warning log).
    /// Notifications themselves are never dropped because of it.
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl RouterConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            destination: DestinationConfig::default(),
            checkpoint: CheckpointConfig::default(),
            enable_metrics: default_enable_metrics(),
            token_ordering: TokenOrdering::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the destination
    pub fn with_destination(mut self, destination: DestinationConfig) -> Self {
        self.destination = destination;
        self
    }

    /// Enable or disable delivery counters
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Set the token ordering policy
    pub fn with_token_ordering(mut self, ordering: TokenOrdering) -> Self {
        self.token_ordering = ordering;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.destination.validate()?;
        self.checkpoint.validate()?;

        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationConfig {
    /// One JSON envelope per line on standard output
    Stdout {
        /// Wrap each envelope in an object under this key
        #[serde(default)]
        json_namespace: Option<String>,
    },

    /// One structured tracing record per envelope
    Log,

    /// Append JSON lines to a file
    File {
        /// Path to the output file
        path: String,
    },

    /// POST each envelope to an HTTP endpoint
    Http {
        /// Endpoint URL
        url: String,
        /// Optional bearer token
        #[serde(default)]
        bearer_token: Option<String>,
    },

    /// Custom destination
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl DestinationConfig {
    /// Validate the destination configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DestinationConfig::Stdout { json_namespace } => {
                if json_namespace.as_deref() == Some("") {
                    return Err(crate::Error::config(
                        "Stdout JSON namespace cannot be empty when set",
                    ));
                }
                Ok(())
            }
            DestinationConfig::Log => Ok(()),
            DestinationConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("File destination path cannot be empty"));
                }
                Ok(())
            }
            DestinationConfig::Http { url, .. } => {
                if url.is_empty() {
                    return Err(crate::Error::config("HTTP destination URL cannot be empty"));
                }
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(crate::Error::config(format!(
                        "HTTP destination URL must use http or https scheme. Got: {}",
                        url
                    )));
                }
                Ok(())
            }
            DestinationConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom destination factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom destination config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the destination type name (the registry key)
    pub fn type_name(&self) -> &str {
        match self {
            DestinationConfig::Stdout { .. } => "stdout",
            DestinationConfig::Log => "log",
            DestinationConfig::File { .. } => "file",
            DestinationConfig::Http { .. } => "http",
            DestinationConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        DestinationConfig::Stdout {
            json_namespace: None,
        }
    }
}

/// Checkpoint store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckpointConfig {
    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// File-based store
    File {
        /// Path to the checkpoint file
        path: String,
    },
}

impl CheckpointConfig {
    /// Validate the checkpoint configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            CheckpointConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Checkpoint file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

fn default_enable_metrics() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    1000
}
