//! Health check service.
//!
//! # Responsibilities
//! - Run one long-lived monitoring task per service
//! - Periodically run the configured check strategy and fold the result into
//!   the hysteresis counter
//! - Accept live reconfiguration without restarting the task
//! - Publish a stats snapshot that readers can load without blocking
//!
//! # Design Decisions
//! - Configuration is handed over through a single-slot `watch` channel; only
//!   the latest value matters and `update_config` never blocks
//! - A tick that is already running finishes and is applied before a new
//!   configuration takes over
//! - A panic inside the loop is fail-stop: the service reports unhealthy and
//!   must be replaced

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{CheckProtocol, HealthCheckConfig};
use crate::health::state::{counter_is_healthy, ErrorCounter};
use crate::health::strategy::{run_check, strategy_for, CheckError, StrategyBuilder};
use crate::observability::metrics;

/// Errors returned by [`HealthCheckService`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthError {
    #[error("health check service is closed")]
    Closed,

    #[error("health check service stopped after an internal panic")]
    InternalPanic,
}

/// Whether the monitoring loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Running,
    #[default]
    Stopped,
}

/// Counters published by the monitoring loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct HealthCheckStats {
    /// Check rounds run under the current configuration.
    pub count: u64,
    /// Signed hysteresis counter; negative means unhealthy.
    pub error_count: i64,
    /// The loop stopped on an internal panic.
    pub panicked: bool,
    /// Diagnostic of the latest failed round, empty after a success.
    pub latest_error: String,
    pub status: CheckStatus,
}

#[derive(Debug, Default)]
struct Snapshot {
    stats: HealthCheckStats,
    config: Option<HealthCheckConfig>,
}

impl Snapshot {
    fn is_healthy(&self) -> bool {
        let unhealth_threshold = self
            .config
            .as_ref()
            .map_or(i64::MAX, |c| i64::from(c.unhealth_threshold));
        !self.stats.panicked && counter_is_healthy(self.stats.error_count, unhealth_threshold)
    }
}

/// Monitors upstream endpoints and reports a single healthy/unhealthy signal.
pub struct HealthCheckService {
    config_tx: watch::Sender<Option<HealthCheckConfig>>,
    close_tx: watch::Sender<bool>,
    snapshot: Arc<ArcSwap<Snapshot>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthCheckService {
    /// Spawn the monitoring task. Checks start once a configuration arrives.
    pub fn start() -> Self {
        Self::with_strategy_builder(Arc::new(strategy_for))
    }

    /// Spawn the monitoring task with a custom strategy per configuration.
    pub fn with_strategy_builder(builder: StrategyBuilder) -> Self {
        let (config_tx, config_rx) = watch::channel(None);
        let (close_tx, close_rx) = watch::channel(false);
        let snapshot = Arc::new(ArcSwap::from_pointee(Snapshot::default()));

        let monitor = Monitor {
            builder,
            snapshot: snapshot.clone(),
            counter: ErrorCounter::new(0, 0),
            stats: HealthCheckStats::default(),
            config: None,
        };
        let task = tokio::spawn(supervise(monitor, config_rx, close_rx));

        Self {
            config_tx,
            close_tx,
            snapshot,
            task: Mutex::new(Some(task)),
        }
    }

    /// Replace the configuration. Zero numeric fields get their defaults.
    pub fn update_config(&self, config: HealthCheckConfig) -> Result<(), HealthError> {
        if *self.close_tx.borrow() {
            return Err(HealthError::Closed);
        }
        if self.config_tx.send(Some(config.normalized())).is_err() {
            return Err(if self.snapshot.load().stats.panicked {
                HealthError::InternalPanic
            } else {
                HealthError::Closed
            });
        }
        Ok(())
    }

    /// Healthy unless the counter is negative or the loop panicked.
    pub fn is_healthy(&self) -> bool {
        self.snapshot.load().is_healthy()
    }

    pub fn stats(&self) -> HealthCheckStats {
        self.snapshot.load().stats.clone()
    }

    /// Diagnostic of the latest failed round.
    pub fn detail(&self) -> String {
        self.snapshot.load().stats.latest_error.clone()
    }

    /// Protocol of the configuration currently in use.
    pub fn protocol(&self) -> Option<CheckProtocol> {
        self.snapshot.load().config.as_ref().map(|c| c.protocol)
    }

    /// Stop the loop and clear the stats. The service cannot be restarted.
    pub async fn close(&self) {
        self.close_tx.send_replace(true);
        let task = self.task.lock().expect("health task mutex poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// State owned by the monitoring task.
struct Monitor {
    builder: StrategyBuilder,
    snapshot: Arc<ArcSwap<Snapshot>>,
    counter: ErrorCounter,
    stats: HealthCheckStats,
    config: Option<HealthCheckConfig>,
}

impl Monitor {
    fn publish(&self) {
        self.snapshot.store(Arc::new(Snapshot {
            stats: self.stats.clone(),
            config: self.config.clone(),
        }));
    }

    fn begin(&mut self, config: HealthCheckConfig) {
        self.counter = ErrorCounter::new(config.health_threshold, config.unhealth_threshold);
        self.stats = HealthCheckStats {
            status: CheckStatus::Running,
            ..Default::default()
        };
        self.config = Some(config);
        self.publish();
    }

    fn apply(&mut self, result: Result<(), CheckError>) {
        let was_healthy = self.counter.is_healthy();
        self.stats.count += 1;
        match result {
            Ok(()) => {
                self.counter.record_success();
                self.stats.latest_error.clear();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Health check round failed");
                self.counter.record_failure();
                self.stats.latest_error = e.to_string();
            }
        }
        self.stats.error_count = self.counter.value();

        let healthy = self.counter.is_healthy();
        if was_healthy && !healthy {
            tracing::warn!(error = %self.stats.latest_error, "Upstream marked unhealthy");
        } else if !was_healthy && healthy {
            tracing::info!("Upstream recovered");
        }
        metrics::record_check(self.stats.latest_error.is_empty());
        metrics::record_health(healthy);
        self.publish();
    }

    fn stop(&mut self) {
        self.stats = HealthCheckStats::default();
        self.publish();
        tracing::info!("Health check service stopped");
    }

    async fn run(
        &mut self,
        mut config_rx: watch::Receiver<Option<HealthCheckConfig>>,
        mut close_rx: watch::Receiver<bool>,
    ) {
        let mut config = loop {
            tokio::select! {
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        return self.stop();
                    }
                    let next = config_rx.borrow_and_update().clone();
                    if let Some(next) = next {
                        break next;
                    }
                }
                _ = close_rx.changed() => return self.stop(),
            }
        };

        loop {
            let strategy = (self.builder)(&config);
            let period = config.interval();
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                protocol = %config.protocol,
                strategy = strategy.name(),
                interval_secs = config.interval_secs,
                addresses = ?config.addresses,
                "Health check running"
            );
            self.begin(config.clone());

            config = loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let result = run_check(strategy.as_ref(), &config.addresses, config.timeout()).await;
                        self.apply(result);
                    }
                    changed = config_rx.changed() => {
                        if changed.is_err() {
                            return self.stop();
                        }
                        let next = config_rx.borrow_and_update().clone();
                        if let Some(next) = next {
                            tracing::info!("Health check reconfigured");
                            break next;
                        }
                    }
                    _ = close_rx.changed() => return self.stop(),
                }
            };
        }
    }
}

async fn supervise(
    mut monitor: Monitor,
    config_rx: watch::Receiver<Option<HealthCheckConfig>>,
    close_rx: watch::Receiver<bool>,
) {
    let snapshot = monitor.snapshot.clone();
    let outcome = AssertUnwindSafe(monitor.run(config_rx, close_rx))
        .catch_unwind()
        .await;

    if outcome.is_err() {
        tracing::error!("Health check loop panicked, service stopped");
        let current = snapshot.load();
        let mut stats = current.stats.clone();
        stats.panicked = true;
        stats.status = CheckStatus::Stopped;
        snapshot.store(Arc::new(Snapshot {
            stats,
            config: current.config.clone(),
        }));
        metrics::record_health(false);
    }
}
