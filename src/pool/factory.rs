//! Connection factory abstraction.
//!
//! The pool never inspects a connection; it only asks the factory to
//! create, close and probe one.

use std::future::Future;
use std::io;

/// Produces, closes and liveness-probes raw connections for a pool.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The connection handle owned by the pool and its callers.
    type Connection: Send + 'static;

    /// Open a new connection.
    fn create(&self) -> impl Future<Output = io::Result<Self::Connection>> + Send;

    /// Close a connection, consuming it.
    fn close(&self, conn: Self::Connection) -> impl Future<Output = io::Result<()>> + Send;

    /// Check that a connection is still usable.
    fn probe(&self, conn: &mut Self::Connection) -> impl Future<Output = io::Result<()>> + Send;
}
