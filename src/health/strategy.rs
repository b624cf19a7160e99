//! Check strategy contract and concurrent aggregation.
//!
//! # Responsibilities
//! - Define the per-address probe a strategy provides
//! - Fan out one task per address under a shared deadline
//! - Reduce the results: first failure wins, success needs every address
//!
//! # Design Decisions
//! - Probe tasks are never aborted; a result arriving after the round is
//!   decided is dropped by a non-blocking send
//! - An empty address list is a configuration error, reported before any probe

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::config::{CheckProtocol, HealthCheckConfig};
use crate::health::http::HttpStatusCheck;
use crate::health::native::HeartbeatCheck;

/// Why a check round failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("no available address")]
    NoAddresses,

    #[error("health check timeout")]
    Timeout,

    #[error("server {address} health check error: {reason}")]
    EndpointFailure { address: String, reason: String },

    /// Every probe task ended without reporting, e.g. it panicked.
    #[error("health check probe aborted")]
    ProbeAborted,
}

/// Outcome of probing one address: `Err` carries the diagnostic.
pub type ProbeFuture = BoxFuture<'static, Result<(), String>>;

/// A liveness test that can be run against one address.
pub trait CheckStrategy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Start probing `address`. `timeout` bounds the probe's own I/O.
    fn probe(&self, address: &str, timeout: Duration) -> ProbeFuture;
}

/// Builds the strategy for a configuration.
pub type StrategyBuilder = Arc<dyn Fn(&HealthCheckConfig) -> Arc<dyn CheckStrategy> + Send + Sync>;

/// Strategy selected by the configured protocol.
pub fn strategy_for(config: &HealthCheckConfig) -> Arc<dyn CheckStrategy> {
    match config.protocol {
        CheckProtocol::Native => Arc::new(HeartbeatCheck),
        CheckProtocol::Http => Arc::new(HttpStatusCheck::new(config.enable_tls)),
    }
}

struct ProbeResult {
    address: String,
    result: Result<(), String>,
}

/// Probe every address concurrently and aggregate the results.
pub async fn run_check(
    strategy: &dyn CheckStrategy,
    addresses: &[String],
    timeout: Duration,
) -> Result<(), CheckError> {
    if addresses.is_empty() {
        return Err(CheckError::NoAddresses);
    }

    let deadline = Instant::now() + timeout;
    let (tx, mut rx) = mpsc::channel(addresses.len());
    for address in addresses {
        let probe = strategy.probe(address, timeout);
        let tx = tx.clone();
        let address = address.clone();
        tokio::spawn(async move {
            let result = probe.await;
            // Capacity equals the address count, so this only fails once
            // the round has been decided and the receiver is gone.
            let _ = tx.try_send(ProbeResult { address, result });
        });
    }
    drop(tx);

    let mut succeeded = 0;
    loop {
        match time::timeout_at(deadline, rx.recv()).await {
            Err(_) => return Err(CheckError::Timeout),
            Ok(None) => return Err(CheckError::ProbeAborted),
            Ok(Some(ProbeResult { result: Ok(()), .. })) => {
                succeeded += 1;
                if succeeded == addresses.len() {
                    return Ok(());
                }
            }
            Ok(Some(ProbeResult {
                address,
                result: Err(reason),
            })) => return Err(CheckError::EndpointFailure { address, reason }),
        }
    }
}
