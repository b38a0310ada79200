//! Request observer.
//!
//! Emits the log events of the admission pipeline:
//! - exactly one `info` event per request when it is observed
//! - exactly one `error` event per rejection
//! - a `warn` event when a limiter is bypassed because the store is down
//!
//! Request bodies are never logged.

use tracing::{error, info, warn};

use super::metrics;
use crate::admission::{AdmissionRequest, Denial};
use crate::limiter::{ClientIdentity, LimitScope};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestObserver;

impl RequestObserver {
    pub fn new() -> Self {
        Self
    }

    /// `Received → Observed`.
    pub fn observed(&self, request: &AdmissionRequest) {
        info!(
            request_id = request.request_id.as_deref().unwrap_or("-"),
            method = %request.method,
            path = %request.path,
            "Received {} request to {}",
            request.method,
            request.path
        );
    }

    pub fn admitted(&self, _request: &AdmissionRequest) {
        metrics::record_admission("admitted", "none");
    }

    pub fn rejected(&self, request: &AdmissionRequest, identity: Option<&ClientIdentity>, denial: &Denial) {
        let client = identity.map(ClientIdentity::as_str).unwrap_or("-");
        match denial {
            Denial::RateExceeded(rejection) => error!(
                request_id = request.request_id.as_deref().unwrap_or("-"),
                client = %client,
                scope = %rejection.scope,
                retry_after_secs = ?rejection.retry_after_secs,
                path = %request.path,
                "Too many requests from IP: {}",
                client
            ),
            Denial::StoreUnavailable(scope) => error!(
                request_id = request.request_id.as_deref().unwrap_or("-"),
                client = %client,
                scope = %scope,
                path = %request.path,
                "Rejected request: counter store unavailable"
            ),
            Denial::UnidentifiedClient => error!(
                request_id = request.request_id.as_deref().unwrap_or("-"),
                path = %request.path,
                "Rejected request without a client address"
            ),
        }
        metrics::record_admission("rejected", denial.scope_label());
    }

    /// A limiter could not be consulted and the request was let through.
    pub fn degraded(&self, request: &AdmissionRequest, scope: LimitScope, err: &StoreError) {
        warn!(
            request_id = request.request_id.as_deref().unwrap_or("-"),
            scope = %scope,
            path = %request.path,
            error = %err,
            "Counter store unavailable; failing open"
        );
        metrics::record_store_error(scope.as_str(), "fail_open");
    }

    /// A limiter could not be consulted and the request will be rejected.
    pub fn store_failed(&self, scope: LimitScope, err: &StoreError) {
        warn!(scope = %scope, error = %err, "Counter store unavailable; failing closed");
        metrics::record_store_error(scope.as_str(), "fail_closed");
    }
}
