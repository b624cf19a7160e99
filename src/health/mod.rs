//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! service.rs (monitoring loop):
//!     Periodic timer / new config / close
//!     → strategy.rs run_check (one task per address, shared deadline)
//!         → native.rs (TCP dial + heartbeat) or http.rs (GET /stat)
//!     → state.rs counter update
//!     → stats snapshot published to readers
//! ```
//!
//! # Design Decisions
//! - Asymmetric hysteresis: `unhealth_threshold` failures to go down,
//!   `health_threshold` consecutive successes to come back
//! - Any failing address fails the whole round
//! - Health is reported, never acted upon; routing is up to the caller

pub mod http;
pub mod native;
pub mod service;
pub mod state;
pub mod strategy;

pub use service::{CheckStatus, HealthCheckService, HealthCheckStats, HealthError};
pub use state::ErrorCounter;
pub use strategy::{run_check, strategy_for, CheckError, CheckStrategy, ProbeFuture, StrategyBuilder};
