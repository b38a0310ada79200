//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the request gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deployment environment; drives the default log level.
    pub environment: Environment,

    /// Shared counter store connection.
    pub store: StoreConfig,

    /// Global consumption limiter applied to every request.
    pub global_limit: ConsumptionLimitConfig,

    /// Fixed-window limiter applied to the sensitive route group.
    pub sensitive_limit: WindowLimitConfig,

    /// How the client identity is derived.
    pub identity: IdentityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Security headers, CORS and body limits.
    pub security: SecurityConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse the conventional `NODE_ENV`-style value. Anything other than
    /// "production" counts as development.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    /// Log level used when neither config nor `RUST_LOG` sets one.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Environment::Production => "info",
            Environment::Development => "debug",
        }
    }
}

/// Which counter store implementation to use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared Redis server; limits hold across instances.
    #[default]
    Redis,
    /// Process memory; limits hold within one instance only.
    Memory,
}

/// Counter store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Redis connection URL.
    pub url: String,

    /// Deadline for every store call in milliseconds.
    pub timeout_ms: u64,

    /// Deadline for the initial connection in milliseconds.
    pub connect_timeout_ms: u64,

    /// How often the memory backend drops expired counters, in seconds.
    pub sweep_interval_secs: u64,
}

impl StoreConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            url: "redis://localhost:6379".to_string(),
            timeout_ms: 250,
            connect_timeout_ms: 5_000,
            sweep_interval_secs: 60,
        }
    }
}

/// What to do with a request when the counter store cannot answer.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Let the request through and log a warning.
    FailOpen,
    /// Reject the request with 503.
    FailClosed,
}

/// Rolling-window budget for the global limiter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumptionLimitConfig {
    pub enabled: bool,

    /// Units allowed in any span of `duration_secs`.
    pub points: u64,

    /// Length of the rolling window, in seconds.
    pub duration_secs: u64,

    /// Store key namespace.
    pub key_prefix: String,

    pub on_store_unavailable: FailurePolicy,
}

impl ConsumptionLimitConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for ConsumptionLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            points: 10,
            duration_secs: 1,
            key_prefix: "middleware".to_string(),
            on_store_unavailable: FailurePolicy::FailOpen,
        }
    }
}

/// Fixed-window quota for the sensitive route group.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowLimitConfig {
    pub enabled: bool,

    /// Path prefix the quota applies to.
    pub scope: String,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per window.
    pub max: u64,

    /// Store key namespace.
    pub key_prefix: String,

    pub on_store_unavailable: FailurePolicy,

    /// Emit `RateLimit-*` headers on in-scope responses.
    pub standard_headers: bool,
}

impl WindowLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for WindowLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: "/api/v1/".to_string(),
            window_ms: 15 * 60 * 1000,
            max: 100,
            key_prefix: "rate-limit:".to_string(),
            on_store_unavailable: FailurePolicy::FailClosed,
            standard_headers: true,
        }
    }
}

/// What to do when a request carries no peer address.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingAddressPolicy {
    /// Count the request against one shared empty-string key.
    #[default]
    SharedKey,
    /// Reject the request with 400.
    Reject,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub missing_address: MissingAddressPolicy,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 100 * 1024, // 100KB
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). Falls back to the
    /// environment default when unset.
    pub log_level: Option<String>,

    pub log_format: LogFormat,

    /// Directory for `combined.log` and `error.log`; console only when unset.
    pub log_dir: Option<String>,

    /// Service name, reported once when logging starts.
    pub service_name: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            log_format: LogFormat::Pretty,
            log_dir: None,
            service_name: "request-gate".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = GateConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:5000");
        assert_eq!(config.global_limit.points, 10);
        assert_eq!(config.global_limit.duration(), Duration::from_secs(1));
        assert_eq!(config.global_limit.on_store_unavailable, FailurePolicy::FailOpen);
        assert_eq!(config.sensitive_limit.window(), Duration::from_secs(900));
        assert_eq!(config.sensitive_limit.max, 100);
        assert_eq!(config.sensitive_limit.on_store_unavailable, FailurePolicy::FailClosed);
        assert_eq!(config.identity.missing_address, MissingAddressPolicy::SharedKey);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GateConfig = toml::from_str(
            r#"
            environment = "production"

            [global_limit]
            points = 50
            on_store_unavailable = "fail_closed"

            [store]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.global_limit.points, 50);
        assert_eq!(config.global_limit.duration_secs, 1);
        assert_eq!(config.global_limit.on_store_unavailable, FailurePolicy::FailClosed);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.sensitive_limit.scope, "/api/v1/");
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from_env_value("production"), Environment::Production);
        assert_eq!(Environment::from_env_value("PRODUCTION "), Environment::Production);
        assert_eq!(Environment::from_env_value("staging"), Environment::Development);
        assert_eq!(Environment::Production.default_log_level(), "info");
        assert_eq!(Environment::Development.default_log_level(), "debug");
    }
}
