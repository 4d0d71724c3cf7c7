//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: MonitorConfig → Result<(), Vec<ValidationError>>
//! - Serde handles syntax; this handles ranges and required values

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{MonitorConfig, ProbeMethod};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
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

pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.device.host.trim().is_empty() {
        errors.push(ValidationError::new("device.host", "must not be empty"));
    }

    if config.probe.cadence_ms == 0 {
        errors.push(ValidationError::new("probe.cadence_ms", "must be greater than 0"));
    }
    if config.probe.window_size == 0 {
        errors.push(ValidationError::new("probe.window_size", "must be at least 1"));
    }
    if config.probe.timeout_ms == 0 {
        errors.push(ValidationError::new("probe.timeout_ms", "must be greater than 0"));
    }
    if let ProbeMethod::Tcp { port: 0 } = config.probe.method {
        errors.push(ValidationError::new("probe.method.port", "must not be 0"));
    }

    if config.broker.host.trim().is_empty() {
        errors.push(ValidationError::new("broker.host", "must not be empty"));
    }
    if config.broker.port == 0 {
        errors.push(ValidationError::new("broker.port", "must not be 0"));
    }
    if config.broker.request_timeout_ms == 0 {
        errors.push(ValidationError::new("broker.request_timeout_ms", "must be greater than 0"));
    }

    if config.dispatch.queue.trim().is_empty() {
        errors.push(ValidationError::new("dispatch.queue", "must not be empty"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
