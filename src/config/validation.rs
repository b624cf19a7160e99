//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate pool bounds and value ranges
//! - Check health check addresses look like `host:port`
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ClientConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.detector.address.trim().is_empty() {
        errors.push(ValidationError::new("detector.address", "must not be empty"));
    }

    let pool = &config.pool;
    if pool.max_idle == 0 {
        errors.push(ValidationError::new("pool.max_idle", "must be greater than 0"));
    }
    if pool.initial_cap > pool.max_idle {
        errors.push(ValidationError::new(
            "pool.initial_cap",
            format!("{} exceeds max_idle {}", pool.initial_cap, pool.max_idle),
        ));
    }
    if pool.max_idle > pool.max_active {
        errors.push(ValidationError::new(
            "pool.max_idle",
            format!("{} exceeds max_active {}", pool.max_idle, pool.max_active),
        ));
    }

    for address in &config.health_check.addresses {
        if !is_host_port(address) {
            errors.push(ValidationError::new(
                "health_check.addresses",
                format!("'{}' is not host:port", address),
            ));
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
