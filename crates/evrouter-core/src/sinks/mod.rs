// # Built-in Destinations
//
// Destinations that need nothing beyond the core's own dependencies.
// Network destinations live in their own crates.

pub mod stdout;
pub mod log;
pub mod file;

pub use stdout::{StdoutSink, StdoutSinkFactory};
pub use log::{LogSink, LogSinkFactory};
pub use file::{FileSink, FileSinkFactory};
