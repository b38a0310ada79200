//! Request Gate Library
//!
//! Two-tier request admission in front of an HTTP API: a global per-client
//! rolling window on every request, and a fixed-window quota on a sensitive
//! route group. Counters live in a shared store so limits hold across
//! instances.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod limiter;
pub mod observability;
pub mod security;
pub mod store;

pub use admission::AdmissionPipeline;
pub use config::GateConfig;
pub use error::GateError;
pub use http::GateServer;
pub use lifecycle::{Gate, Shutdown};
