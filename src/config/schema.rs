//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the detector client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Detection service endpoint used by the connection pool.
    pub detector: DetectorConfig,

    /// Connection pool bounds.
    pub pool: PoolConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Detection service endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Address of the detection service (e.g., "127.0.0.1:8000").
    pub address: String,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".to_string(),
            connect_timeout_ms: 3000,
        }
    }
}

impl DetectorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Connection pool bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections opened when the pool is created.
    pub initial_cap: usize,

    /// Capacity of the idle queue.
    pub max_idle: usize,

    /// Ceiling on connections open at the same time.
    pub max_active: usize,

    /// Idle connections older than this are discarded on acquisition (0 = never).
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_cap: 1,
            max_idle: 16,
            max_active: 32,
            idle_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Liveness test used by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckProtocol {
    /// Heartbeat exchange over the detection protocol.
    #[default]
    #[serde(alias = "t1k")]
    Native,
    /// `GET /stat` expecting status 200.
    Http,
}

impl fmt::Display for CheckProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckProtocol::Native => write!(f, "native"),
            CheckProtocol::Http => write!(f, "http"),
        }
    }
}

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_HEALTH_THRESHOLD: u32 = 5;
pub const DEFAULT_UNHEALTH_THRESHOLD: u32 = 3;
pub const DEFAULT_CHECK_TIMEOUT_MS: u64 = 3000;

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Seconds between two checks.
    pub interval_secs: u64,

    /// Consecutive successes needed to recover from unhealthy.
    pub health_threshold: u32,

    /// Failures tolerated before flipping to unhealthy.
    pub unhealth_threshold: u32,

    /// Endpoints to probe (e.g., ["10.0.0.1:8000", "10.0.0.2:8000"]).
    pub addresses: Vec<String>,

    /// Shared deadline for one check round in milliseconds.
    pub timeout_ms: u64,

    /// Which check strategy to run.
    pub protocol: CheckProtocol,

    /// Use `https` for the HTTP check.
    pub enable_tls: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            health_threshold: DEFAULT_HEALTH_THRESHOLD,
            unhealth_threshold: DEFAULT_UNHEALTH_THRESHOLD,
            addresses: Vec::new(),
            timeout_ms: DEFAULT_CHECK_TIMEOUT_MS,
            protocol: CheckProtocol::Native,
            enable_tls: false,
        }
    }
}

impl HealthCheckConfig {
    /// Replace zero-valued numeric fields with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.interval_secs == 0 {
            self.interval_secs = DEFAULT_CHECK_INTERVAL_SECS;
        }
        if self.health_threshold == 0 {
            self.health_threshold = DEFAULT_HEALTH_THRESHOLD;
        }
        if self.unhealth_threshold == 0 {
            self.unhealth_threshold = DEFAULT_UNHEALTH_THRESHOLD;
        }
        if self.timeout_ms == 0 {
            self.timeout_ms = DEFAULT_CHECK_TIMEOUT_MS;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
