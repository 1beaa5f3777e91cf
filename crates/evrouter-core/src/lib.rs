// # evrouter-core
//
// Core library for routing cluster event records to a destination.
//
// ## Architecture Overview
//
// - **WatchSource**: Trait for observing create/update/delete changes
// - **EventRouter**: Admits only newer records and forwards them as envelopes
// - **PositionCursor**: Remembers the last forwarded position token
// - **Destination**: Trait for consuming envelopes (stdout, log, file, http, ...)
// - **DestinationRegistry**: Plugin-based registry for destinations
// - **CheckpointStore**: Trait for persisting the position across restarts
// - **DeliveryCounters**: Per-category delivery counters
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Routing logic is separate from sources and sinks
// 2. **Event-Driven**: Uses async streams for change notifications
// 3. **Plugin-Based**: Destinations are registered by name, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **At-most-once per position**: A position token is forwarded once at most

pub mod traits;
pub mod event;
pub mod envelope;
pub mod cursor;
pub mod router;
pub mod registry;
pub mod config;
pub mod error;
pub mod metrics;
pub mod sinks;
pub mod checkpoint;

// Re-export core types for convenience
pub use traits::{ChangeNotification, CheckpointStore, Destination, Payload, WatchSource};
pub use event::{Category, Event};
pub use envelope::{EventData, Verb};
pub use cursor::{PositionCursor, TokenOrdering};
pub use router::{EventRouter, RouterEvent};
pub use registry::DestinationRegistry;
pub use config::{CheckpointConfig, DestinationConfig, RouterConfig};
pub use error::{Error, Result};
pub use metrics::DeliveryCounters;
pub use checkpoint::{CheckpointWriter, FileCheckpointStore, MemoryCheckpointStore};
