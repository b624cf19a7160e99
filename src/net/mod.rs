//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ChannelPool::get
//!     → factory.rs (dial with connect timeout)
//!     → TcpStream handed to the caller
//!
//! Liveness (pool probe, native health check):
//!     → codec.rs heartbeat (header section out, reply sections in)
//! ```

pub mod codec;
pub mod factory;

pub use factory::TcpFactory;
