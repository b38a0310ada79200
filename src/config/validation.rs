//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (budgets > 0, timeouts > 0, addresses parse)
//! - Check the sensitive scope is a usable path prefix
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GateConfig, StoreBackend};
use crate::limiter::namespace;

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

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }

    if config.store.backend == StoreBackend::Redis {
        match url::Url::parse(&config.store.url) {
            Ok(url) if matches!(url.scheme(), "redis" | "rediss") => {}
            _ => errors.push(ValidationError::new(
                "store.url",
                "must be a redis:// or rediss:// URL",
            )),
        }
    }
    if config.store.timeout_ms == 0 {
        errors.push(ValidationError::new("store.timeout_ms", "must be greater than 0"));
    }
    if config.store.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("store.connect_timeout_ms", "must be greater than 0"));
    }
    if config.store.backend == StoreBackend::Memory && config.store.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("store.sweep_interval_secs", "must be greater than 0"));
    }

    let global = &config.global_limit;
    if global.points == 0 {
        errors.push(ValidationError::new("global_limit.points", "must be greater than 0"));
    }
    if global.duration_secs == 0 {
        errors.push(ValidationError::new("global_limit.duration_secs", "must be greater than 0"));
    }
    if global.key_prefix.is_empty() {
        errors.push(ValidationError::new("global_limit.key_prefix", "must not be empty"));
    }

    let sensitive = &config.sensitive_limit;
    if !sensitive.scope.starts_with('/') {
        errors.push(ValidationError::new("sensitive_limit.scope", "must start with '/'"));
    }
    if sensitive.window_ms == 0 {
        errors.push(ValidationError::new("sensitive_limit.window_ms", "must be greater than 0"));
    }
    if sensitive.max == 0 {
        errors.push(ValidationError::new("sensitive_limit.max", "must be greater than 0"));
    }
    if sensitive.key_prefix.is_empty() {
        errors.push(ValidationError::new("sensitive_limit.key_prefix", "must not be empty"));
    }
    if global.enabled
        && sensitive.enabled
        && namespace(&global.key_prefix) == namespace(&sensitive.key_prefix)
    {
        errors.push(ValidationError::new(
            "sensitive_limit.key_prefix",
            "must differ from global_limit.key_prefix",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }
    for origin in &config.security.cors_origins {
        if origin != "*" && !is_origin(origin) {
            errors.push(ValidationError::new(
                "security.cors_origins",
                format!("not an http(s) origin: {origin}"),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `scheme://host[:port]` with no path, as browsers send in `Origin`.
fn is_origin(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && !value.ends_with('/')
                && url.query().is_none()
        }
        Err(_) => false,
    }
}
