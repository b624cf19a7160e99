//! Connection pool error definitions.

use std::io;
use thiserror::Error;

/// Errors returned by [`ChannelPool`](super::ChannelPool) operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was released before or while the caller was waiting.
    #[error("pool is closed")]
    PoolClosed,

    /// A waiter was dismissed without receiving a connection.
    #[error("max active connections reached")]
    MaxActiveReached,

    /// The factory was cleared by `release`.
    #[error("factory is missing, connection pool might be released")]
    FactoryMissing,

    /// A connection was returned after `release`.
    #[error("connection pool has been released")]
    PoolReleased,

    /// Capacity settings violate `initial_cap <= max_idle <= max_active`.
    #[error("invalid capacity settings: initial={initial_cap} max_idle={max_idle} max_active={max_active}")]
    InvalidCapacity {
        initial_cap: usize,
        max_idle: usize,
        max_active: usize,
    },

    /// The factory failed while filling the initial connections.
    #[error("factory is not able to fill the pool: {0}")]
    Fill(#[source] io::Error),

    /// Error from the factory's create/close/probe, passed through unchanged.
    #[error(transparent)]
    Factory(#[from] io::Error),
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
