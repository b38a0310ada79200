//! Top-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, GateError>;

/// Anything that stops the gate from starting or running.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("counter store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("logging setup failed: {0}")]
    Logging(String),
}
