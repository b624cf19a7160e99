//! Client-side resource layer for a remote detection service.
//!
//! Two subsystems:
//! - [`pool`]: bounded connection pool with FIFO waiter queueing
//! - [`health`]: hysteresis-based health monitoring of upstream endpoints

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pool;

pub use config::ClientConfig;
pub use health::HealthCheckService;
pub use net::TcpFactory;
pub use pool::ChannelPool;
