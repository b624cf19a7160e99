//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! Caller → ChannelPool::get
//!     → idle queue (expired / probe-failing entries are closed and skipped)
//!     → factory.rs create (while opening < max_active)
//!     → otherwise park on a oneshot waiter until a put or release
//!
//! Caller → ChannelPool::put
//!     → oldest live waiter (direct handoff)
//!     → idle queue
//!     → close when the idle queue is full
//! ```
//!
//! # Design Decisions
//! - Liveness and idle timeout are checked lazily on acquisition, no reaper task
//! - Waiters are served strictly FIFO
//! - Factory errors are returned as-is, the pool never retries a create

pub mod channel;
pub mod error;
pub mod factory;

pub use channel::{ChannelPool, PoolStatus};
pub use error::{PoolError, PoolResult};
pub use factory::ConnectionFactory;
