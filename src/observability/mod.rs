//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Admission pipeline:
//!     → observer.rs (one log event per decision, metrics)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, combined.log, error.log)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows into every admission log event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod observer;

pub use logging::{init_logging, LogGuards};
pub use observer::RequestObserver;
