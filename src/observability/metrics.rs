//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_admissions_total` (counter): decisions by outcome and scope
//! - `gate_store_errors_total` (counter): counter store failures by scope and
//!   the policy applied
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are static strings; client identities never become labels

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one admission decision.
///
/// `scope` is "none" for admitted requests.
pub fn record_admission(outcome: &'static str, scope: &'static str) {
    metrics::counter!("gate_admissions_total", "outcome" => outcome, "scope" => scope).increment(1);
}

/// Record a counter store failure and the policy that handled it.
pub fn record_store_error(scope: &'static str, policy: &'static str) {
    metrics::counter!("gate_store_errors_total", "scope" => scope, "policy" => policy).increment(1);
}
