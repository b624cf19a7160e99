//! Health state machine.
//!
//! # States
//! One signed counter `E` bounded by the unhealth threshold `U` and the
//! health threshold `H`:
//!
//! ```text
//!        unhealthy     |     healthy      |   (never stored)
//! ---- -H ........ -1  0  1 ........... U  U+1 ---->
//!      recovering      |  tolerated failures
//! ```
//!
//! # State Transitions
//! ```text
//! failure, E >= 0: E += 1; E > U flips to E = -H
//! failure, E <  0: E = -H (pinned while unhealthy)
//! success, E <  0: E += 1 (H successes to recover)
//! success, E >= 0: E = 0
//! ```

/// Signed error counter with asymmetric thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCounter {
    value: i64,
    health_threshold: i64,
    unhealth_threshold: i64,
}

impl ErrorCounter {
    pub fn new(health_threshold: u32, unhealth_threshold: u32) -> Self {
        Self {
            value: 0,
            health_threshold: i64::from(health_threshold),
            unhealth_threshold: i64::from(unhealth_threshold),
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn record_failure(&mut self) {
        if self.value < 0 {
            self.value = -self.health_threshold;
            return;
        }
        self.value += 1;
        if self.value > self.unhealth_threshold {
            self.value = -self.health_threshold;
        }
    }

    pub fn record_success(&mut self) {
        if self.value < 0 {
            self.value += 1;
        } else {
            self.value = 0;
        }
    }

    pub fn is_healthy(&self) -> bool {
        counter_is_healthy(self.value, self.unhealth_threshold)
    }
}

/// Healthy region of the counter: `0 <= value <= unhealth_threshold`.
pub fn counter_is_healthy(value: i64, unhealth_threshold: i64) -> bool {
    (0..=unhealth_threshold).contains(&value)
}
