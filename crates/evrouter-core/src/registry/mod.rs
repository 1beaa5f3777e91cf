//! Plugin-based destination registry
//!
//! The registry maps a configuration key to a destination factory, so the
//! destination is resolved once at startup instead of through a hardcoded
//! switch on the configured name.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use evrouter_core::registry::DestinationRegistry;
//! use evrouter_core::config::DestinationConfig;
//!
//! // Built-in destinations (stdout, log, file) are pre-registered
//! let registry = DestinationRegistry::with_builtins();
//!
//! // Plugin crates add their own
//! evrouter_sink_http::register(&registry);
//!
//! let destination = registry.create_destination(&config.destination)?;
//! ```

use crate::config::DestinationConfig;
use crate::error::{Error, Result};
use crate::sinks::{FileSinkFactory, LogSinkFactory, StdoutSinkFactory};
use crate::traits::{Destination, DestinationFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Destination registry
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct DestinationRegistry {
    /// Registered destination factories
    destinations: RwLock<HashMap<String, Box<dyn DestinationFactory>>>,
}

impl DestinationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in destinations registered
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_destination("stdout", Box::new(StdoutSinkFactory));
        registry.register_destination("log", Box::new(LogSinkFactory));
        registry.register_destination("file", Box::new(FileSinkFactory));
        registry
    }

    /// Register a destination factory
    ///
    /// Registering the same name twice replaces the earlier factory.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use evrouter_core::registry::DestinationRegistry;
    /// # use evrouter_core::traits::DestinationFactory;
    /// # struct MyFactory;
    /// # impl DestinationFactory for MyFactory {
    /// #     fn create(&self, config: &evrouter_core::config::DestinationConfig) -> evrouter_core::Result<Box<dyn evrouter_core::Destination>> { unimplemented!() }
    /// # }
    /// let registry = DestinationRegistry::new();
    /// registry.register_destination("mydestination", Box::new(MyFactory));
    /// ```
    pub fn register_destination(
        &self,
        name: impl Into<String>,
        factory: Box<dyn DestinationFactory>,
    ) {
        let name = name.into();
        match self.destinations.write() {
            Ok(mut destinations) => {
                destinations.insert(name, factory);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(name, factory);
            }
        }
    }

    /// Create a destination from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Destination>)`: Created destination instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_destination(&self, config: &DestinationConfig) -> Result<Box<dyn Destination>> {
        config.validate()?;

        let destination_type = config.type_name();
        let destinations = self
            .destinations
            .read()
            .map_err(|_| Error::config("Destination registry lock poisoned"))?;

        let factory = destinations.get(destination_type).ok_or_else(|| {
            Error::config(format!("Unknown destination type: {}", destination_type))
        })?;

        factory.create(config)
    }

    /// List all registered destination types
    pub fn list_destinations(&self) -> Vec<String> {
        self.destinations
            .read()
            .map(|destinations| destinations.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if a destination type is registered
    pub fn has_destination(&self, name: &str) -> bool {
        self.destinations
            .read()
            .map(|destinations| destinations.contains_key(name))
            .unwrap_or(false)
    }
}
