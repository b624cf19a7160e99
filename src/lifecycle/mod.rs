//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Ctrl-C → Shutdown::trigger
//!     → subscribers stop their loops
//!     → HealthCheckService::close, ChannelPool::release
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
