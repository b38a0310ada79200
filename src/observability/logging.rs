//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Pick the log level from config, falling back to the environment default
//! - Optionally write a combined log and an error-only log to disk
//!
//! # Design Decisions
//! - `RUST_LOG` wins over everything when set
//! - Console output is pretty in development and JSON when configured
//! - File output is always JSON, written off the request path by
//!   `tracing-appender` worker threads

use std::path::Path;
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

use crate::config::{Environment, LogFormat, ObservabilityConfig};
use crate::error::GateError;

pub const COMBINED_LOG: &str = "combined.log";
pub const ERROR_LOG: &str = "error.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Worker guards of the file writers.
///
/// Buffered lines are written out when the guards are dropped, which
/// `std::process::exit` never does; call [`LogGuards::flush`] first.
#[derive(Default)]
pub struct LogGuards(Mutex<Vec<WorkerGuard>>);

impl LogGuards {
    pub fn new(guards: Vec<WorkerGuard>) -> Self {
        Self(Mutex::new(guards))
    }

    /// Stop the writers, blocking until their buffered lines are on disk.
    pub fn flush(&self) {
        if let Ok(mut guards) = self.0.lock() {
            guards.clear();
        }
    }
}

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(config: &ObservabilityConfig, environment: Environment) -> String {
    config
        .log_level
        .clone()
        .unwrap_or_else(|| environment.default_log_level().to_string())
}

/// Install the global subscriber.
///
/// The returned guards flush file output on drop and must be held for the
/// life of the process.
pub fn init_logging(
    config: &ObservabilityConfig,
    environment: Environment,
) -> Result<LogGuards, GateError> {
    let directive = default_directive(config, environment);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&directive).map_err(|e| GateError::Logging(e.to_string()))?,
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();

    layers.push(match config.log_format {
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    });

    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)?;

        let (combined, guard) = file_writer(dir, COMBINED_LOG);
        guards.push(guard);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(combined).boxed());

        let (errors, guard) = file_writer(dir, ERROR_LOG);
        guards.push(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(errors)
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| GateError::Logging(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        environment = ?environment,
        level = %directive,
        log_dir = config.log_dir.as_deref().unwrap_or("-"),
        "Logging initialized"
    );
    Ok(LogGuards::new(guards))
}

fn file_writer(dir: &str, file: &str) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::never(Path::new(dir), file);
    tracing_appender::non_blocking(appender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_writes_buffered_lines() {
        use std::io::Write;

        let dir = std::env::temp_dir().join(format!("request-gate-logs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (mut writer, guard) = file_writer(dir.to_str().unwrap(), ERROR_LOG);
        let guards = LogGuards::new(vec![guard]);

        writer.write_all(b"{\"level\":\"ERROR\",\"message\":\"panic\"}\n").unwrap();
        guards.flush();

        let written = std::fs::read_to_string(dir.join(ERROR_LOG)).unwrap();
        assert!(written.contains("\"message\":\"panic\""));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_level_follows_environment() {
        let config = ObservabilityConfig::default();
        assert_eq!(default_directive(&config, Environment::Production), "info");
        assert_eq!(default_directive(&config, Environment::Development), "debug");
    }

    #[test]
    fn test_explicit_level_wins() {
        let config = ObservabilityConfig {
            log_level: Some("warn,request_gate=trace".to_string()),
            ..ObservabilityConfig::default()
        };
        assert_eq!(
            default_directive(&config, Environment::Production),
            "warn,request_gate=trace"
        );
    }
}
