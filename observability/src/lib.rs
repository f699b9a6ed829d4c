//! Logging and metrics shared by the platform crates.
//!
//! - **Tracing**: `tracing` spans and events, rendered as text or JSON
//! - **Metrics**: counters and a duration histogram recorded through the
//!   `metrics` facade; nothing is exported unless the binary installs a
//!   recorder

pub mod metrics;
pub mod tracing_setup;

pub use metrics::RealizationMetrics;
pub use tracing_setup::{init_tracing, LogFormat, TracingConfig, TracingError};

/// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level};
