//! Per-request admission state machine.
//!
//! # States
//! ```text
//! Received → Observed → GlobalChecked → ScopeChecked → Admitted
//!                │            │       ↘ Skipped      ↗
//!                └────────────┴──────────→ Rejected
//! ```
//!
//! # State Transitions
//! - Received → Observed: observer logs method and path
//! - Observed → GlobalChecked: identity resolved, consumption limiter passed
//!   (or its store is down and the policy is fail-open)
//! - GlobalChecked → ScopeChecked: path inside the sensitive scope and the
//!   window limiter passed
//! - GlobalChecked → Skipped: path outside the scope; the window limiter is
//!   not consulted at all
//! - any check failing → Rejected
//!
//! # Design Decisions
//! - Stages only move forward; each request is evaluated exactly once
//! - The pipeline knows nothing about the router; it sees method, path and
//!   peer address only
//! - Store failure policy is per limiter and comes from configuration

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};

use super::identity::resolve_identity;
use crate::config::{FailurePolicy, GateConfig, MissingAddressPolicy};
use crate::http::response::ErrorEnvelope;
use crate::limiter::{
    ClientIdentity, ConsumptionLimiter, LimitError, LimitScope, Rejection, WindowLimiter,
};
use crate::observability::RequestObserver;
use crate::store::CounterStore;

/// Position of a request in the admission state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Observed,
    GlobalChecked,
    ScopeChecked,
    Skipped,
    Admitted,
    Rejected,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Admitted | Stage::Rejected)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the pipeline needs to know about a request.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub method: Method,
    pub path: String,
    pub peer: Option<SocketAddr>,
    pub request_id: Option<String>,
}

impl AdmissionRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            peer: None,
            request_id: None,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Values for the `RateLimit-*` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaHeaders {
    pub limit: u64,
    pub remaining: u64,
    pub reset_secs: u64,
    pub window_secs: u64,
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// A limiter's budget is exhausted.
    RateExceeded(Rejection),
    /// A fail-closed limiter could not reach the counter store.
    StoreUnavailable(LimitScope),
    /// No peer address and the identity policy rejects such requests.
    UnidentifiedClient,
}

impl Denial {
    pub fn status(&self) -> StatusCode {
        match self {
            Denial::RateExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Denial::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Denial::UnidentifiedClient => StatusCode::BAD_REQUEST,
        }
    }

    /// A new envelope for this denial.
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            Denial::RateExceeded(_) => ErrorEnvelope::too_many_requests(),
            Denial::StoreUnavailable(_) => ErrorEnvelope::service_unavailable(),
            Denial::UnidentifiedClient => {
                ErrorEnvelope::new(StatusCode::BAD_REQUEST, "Unable to identify client")
            }
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Denial::RateExceeded(rejection) => rejection.retry_after_secs,
            _ => None,
        }
    }

    pub fn scope_label(&self) -> &'static str {
        match self {
            Denial::RateExceeded(rejection) => rejection.scope.as_str(),
            Denial::StoreUnavailable(scope) => scope.as_str(),
            Denial::UnidentifiedClient => "identity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Admitted,
    Rejected(Denial),
}

/// Result of evaluating one request.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub outcome: Outcome,
    /// Every stage visited, in order, starting with `Received`.
    pub trail: Vec<Stage>,
    pub identity: Option<ClientIdentity>,
    /// Present for in-scope requests when standard headers are enabled.
    pub quota: Option<QuotaHeaders>,
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        self.outcome == Outcome::Admitted
    }

    pub fn denial(&self) -> Option<&Denial> {
        match &self.outcome {
            Outcome::Rejected(denial) => Some(denial),
            Outcome::Admitted => None,
        }
    }
}

/// Ordered admission checks shared by every request.
pub struct AdmissionPipeline {
    observer: RequestObserver,
    identity_policy: MissingAddressPolicy,
    global: Option<ConsumptionLimiter>,
    global_policy: FailurePolicy,
    sensitive: Option<WindowLimiter>,
    sensitive_policy: FailurePolicy,
    standard_headers: bool,
}

impl AdmissionPipeline {
    /// Build both limiters on top of one shared store.
    pub fn from_config(store: Arc<dyn CounterStore>, config: &GateConfig) -> Self {
        let global = config
            .global_limit
            .enabled
            .then(|| ConsumptionLimiter::new(store.clone(), &config.global_limit));
        let sensitive = config
            .sensitive_limit
            .enabled
            .then(|| WindowLimiter::new(store, &config.sensitive_limit));

        Self {
            observer: RequestObserver::new(),
            identity_policy: config.identity.missing_address,
            global,
            global_policy: config.global_limit.on_store_unavailable,
            sensitive,
            sensitive_policy: config.sensitive_limit.on_store_unavailable,
            standard_headers: config.sensitive_limit.standard_headers,
        }
    }

    /// Run one request through the state machine.
    pub async fn evaluate(&self, request: &AdmissionRequest) -> Verdict {
        let mut stage = Stage::Received;
        let mut trail = vec![stage];
        let mut identity = None;
        let mut quota = None;
        let mut denial = None;

        while !stage.is_terminal() {
            let next = match stage {
                Stage::Received => {
                    self.observer.observed(request);
                    Stage::Observed
                }
                Stage::Observed => match resolve_identity(request.peer, self.identity_policy) {
                    None => {
                        denial = Some(Denial::UnidentifiedClient);
                        Stage::Rejected
                    }
                    Some(id) => {
                        let checked = self.check_global(request, &id).await;
                        identity = Some(id);
                        match checked {
                            Ok(()) => Stage::GlobalChecked,
                            Err(d) => {
                                denial = Some(d);
                                Stage::Rejected
                            }
                        }
                    }
                },
                Stage::GlobalChecked => match (&self.sensitive, identity.as_ref()) {
                    (Some(limiter), Some(id)) if limiter.applies_to(&request.path) => {
                        match self.check_sensitive(limiter, request, id, &mut quota).await {
                            Ok(()) => Stage::ScopeChecked,
                            Err(d) => {
                                denial = Some(d);
                                Stage::Rejected
                            }
                        }
                    }
                    _ => Stage::Skipped,
                },
                Stage::ScopeChecked | Stage::Skipped => Stage::Admitted,
                Stage::Admitted | Stage::Rejected => stage,
            };
            stage = next;
            trail.push(stage);
        }

        let outcome = match denial {
            Some(denial) => {
                self.observer.rejected(request, identity.as_ref(), &denial);
                Outcome::Rejected(denial)
            }
            None => {
                self.observer.admitted(request);
                Outcome::Admitted
            }
        };

        Verdict {
            outcome,
            trail,
            identity,
            quota,
        }
    }

    async fn check_global(&self, request: &AdmissionRequest, identity: &ClientIdentity) -> Result<(), Denial> {
        let Some(limiter) = &self.global else {
            return Ok(());
        };

        match limiter.try_consume(identity, 1).await {
            Ok(_) => Ok(()),
            Err(LimitError::RateExceeded(rejection)) => Err(Denial::RateExceeded(rejection)),
            Err(LimitError::StoreUnavailable { scope, source }) => match self.global_policy {
                FailurePolicy::FailOpen => {
                    self.observer.degraded(request, scope, &source);
                    Ok(())
                }
                FailurePolicy::FailClosed => {
                    self.observer.store_failed(scope, &source);
                    Err(Denial::StoreUnavailable(scope))
                }
            },
        }
    }

    async fn check_sensitive(
        &self,
        limiter: &WindowLimiter,
        request: &AdmissionRequest,
        identity: &ClientIdentity,
        quota: &mut Option<QuotaHeaders>,
    ) -> Result<(), Denial> {
        let window_secs = limiter.window().as_secs();

        match limiter.try_admit(identity, &request.path).await {
            Ok(status) => {
                if self.standard_headers {
                    *quota = Some(QuotaHeaders {
                        limit: status.limit,
                        remaining: status.remaining,
                        reset_secs: status.reset_secs,
                        window_secs,
                    });
                }
                Ok(())
            }
            Err(LimitError::RateExceeded(rejection)) => {
                if self.standard_headers {
                    *quota = Some(QuotaHeaders {
                        limit: limiter.max(),
                        remaining: 0,
                        reset_secs: rejection.retry_after_secs.unwrap_or(window_secs),
                        window_secs,
                    });
                }
                Err(Denial::RateExceeded(rejection))
            }
            Err(LimitError::StoreUnavailable { scope, source }) => match self.sensitive_policy {
                FailurePolicy::FailOpen => {
                    self.observer.degraded(request, scope, &source);
                    Ok(())
                }
                FailurePolicy::FailClosed => {
                    self.observer.store_failed(scope, &source);
                    Err(Denial::StoreUnavailable(scope))
                }
            },
        }
    }
}
