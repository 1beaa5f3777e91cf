//! Core traits for the event router
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`WatchSource`]: Observe changes to the event collection
//! - [`Destination`]: Consume routed envelopes
//! - [`CheckpointStore`]: Persist the position token across restarts

pub mod watch_source;
pub mod destination;
pub mod checkpoint_store;

pub use watch_source::{WatchSource, ChangeNotification, Payload};
pub use destination::{Destination, DestinationFactory};
pub use checkpoint_store::{CheckpointStore, CheckpointRecord};
