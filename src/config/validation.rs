//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window, limit, timeouts > 0)
//! - Check the counter store backend can actually be built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, including on reload

use std::net::SocketAddr;

use crate::config::schema::{GateConfig, StoreBackend};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
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

/// Check a configuration for semantic errors.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    let path = &config.listener.ingest_path;
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
        errors.push(ValidationError::new(
            "listener.ingest_path",
            "must start with '/', not be the root and not end with '/'",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
        }
        if rl.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
        }
        if rl.store_timeout_ms == 0 {
            errors.push(ValidationError::new("rate_limit.store_timeout_ms", "must be greater than 0"));
        }
        if rl.sweep_interval_secs == 0 {
            errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be greater than 0"));
        }
        if rl.key_prefix.is_empty() {
            errors.push(ValidationError::new("rate_limit.key_prefix", "must not be empty"));
        }
        if rl.trust_forwarded_for && rl.trusted_proxies.is_empty() {
            errors.push(ValidationError::new(
                "rate_limit.trusted_proxies",
                "trust_forwarded_for needs at least one trusted proxy",
            ));
        }
        if rl.store.backend == StoreBackend::Redis {
            if rl.store.url.as_deref().map_or(true, str::is_empty) {
                errors.push(ValidationError::new("rate_limit.store.url", "required for the redis backend"));
            }
            if !cfg!(feature = "redis") {
                errors.push(ValidationError::new(
                    "rate_limit.store.backend",
                    "redis backend requires building with the `redis` feature",
                ));
            }
        }
    }

    if config.validation.tag_field.is_empty() {
        errors.push(ValidationError::new("validation.tag_field", "must not be empty"));
    }
    if config.validation.schemas.is_empty() {
        errors.push(ValidationError::new("validation.schemas", "at least one schema is required"));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
