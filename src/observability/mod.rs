//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pool and health subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log output (stdout)
//!     → Whatever metrics recorder the application installs
//! ```

pub mod logging;
pub mod metrics;
