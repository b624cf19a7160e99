//! Metrics collection.
//!
//! # Metrics
//! - `detector_pool_idle_connections` (gauge): idle queue occupancy
//! - `detector_pool_opening_connections` (gauge): connections counted against max_active
//! - `detector_pool_waiters` (gauge): callers parked in `get`
//! - `detector_pool_discarded_total` (counter): connections closed by the pool, by reason
//! - `detector_health_status` (gauge): 1=healthy, 0=unhealthy
//! - `detector_health_checks_total` (counter): check rounds by result
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; installing an exporter is up to the application
//! - Without an installed recorder every call is a no-op

use metrics::{counter, gauge};

use crate::pool::PoolStatus;

pub fn record_pool_status(status: &PoolStatus) {
    gauge!("detector_pool_idle_connections").set(status.idle as f64);
    gauge!("detector_pool_opening_connections").set(status.opening as f64);
    gauge!("detector_pool_waiters").set(status.waiting as f64);
}

pub fn record_pool_discard(reason: &'static str) {
    counter!("detector_pool_discarded_total", "reason" => reason).increment(1);
}

pub fn record_health(healthy: bool) {
    gauge!("detector_health_status").set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_check(ok: bool) {
    let result = if ok { "success" } else { "failure" };
    counter!("detector_health_checks_total", "result" => result).increment(1);
}
