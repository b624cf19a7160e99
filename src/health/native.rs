//! Native protocol health check: dial, heartbeat, hang up.

use std::time::Duration;

use crate::health::strategy::{CheckStrategy, ProbeFuture};
use crate::net::TcpFactory;
use crate::pool::ConnectionFactory;

/// Probes an address with a heartbeat over a fresh TCP connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeartbeatCheck;

impl CheckStrategy for HeartbeatCheck {
    fn name(&self) -> &'static str {
        "native"
    }

    fn probe(&self, address: &str, timeout: Duration) -> ProbeFuture {
        let factory = TcpFactory::new(address, timeout);
        Box::pin(async move {
            let mut conn = factory.create().await.map_err(|e| e.to_string())?;
            let result = factory.probe(&mut conn).await.map_err(|e| e.to_string());
            if let Err(e) = factory.close(conn).await {
                tracing::trace!(addr = %factory.addr(), error = %e, "Failed to close health check connection");
            }
            result
        })
    }
}
