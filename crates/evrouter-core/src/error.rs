//! Error types for the event router
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for event router operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the event router
#[derive(Error, Debug)]
pub enum Error {
    /// A change notification payload was absent or not an event record
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// Destination-related errors
    ///
    /// These never leave a destination's `deliver()`; they exist so
    /// destinations can build and log a uniform error internally.
    #[error("Destination error ({destination}): {message}")]
    Destination {
        /// Destination name
        destination: String,
        /// Error message
        message: String,
    },

    /// Checkpoint store errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Watch source errors
    #[error("Watch source error: {0}")]
    WatchSource(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a malformed notification error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedNotification(msg.into())
    }

    /// Create a destination error
    pub fn destination(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Destination {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a watch source error
    pub fn watch_source(msg: impl Into<String>) -> Self {
        Self::WatchSource(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether this error came from a bad notification payload
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedNotification(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
