//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the Axum router from the route handlers
//! - Wire up middleware (request ID, tracing, security headers, CORS,
//!   admission, timeout, body limit)
//! - Bind to a listener and serve until shutdown
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → security headers → CORS
//!     → admission → error envelope → timeout → body limit → handler
//! ```
//! Rejections produced by admission therefore still carry the request ID and
//! the security headers. Bare 405/408/413 responses from below are rewritten
//! into the error envelope before they leave the gate.
//!
//! Per-request trace events stay at TRACE: the admission observer already
//! emits the one `info` event for each request.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use super::request::{propagate_request_id_layer, set_request_id_layer};
use super::response::{envelope_errors, ErrorEnvelope};
use super::routes::default_routes;
use crate::admission::{admission_middleware, AdmissionPipeline};
use crate::config::GateConfig;
use crate::security::{cors_layer, security_headers};

/// HTTP server for the request gate.
pub struct GateServer {
    router: Router,
}

impl GateServer {
    /// Server with the built-in routes.
    pub fn new(config: &GateConfig, pipeline: Arc<AdmissionPipeline>) -> Self {
        Self::with_routes(config, pipeline, default_routes())
    }

    /// Server gating the given application routes.
    pub fn with_routes(config: &GateConfig, pipeline: Arc<AdmissionPipeline>, routes: Router) -> Self {
        Self {
            router: build_router(config, pipeline, routes),
        }
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GateConfig, pipeline: Arc<AdmissionPipeline>, routes: Router) -> Router {
    let gated = routes
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(middleware::map_response(envelope_errors))
        .layer(middleware::from_fn_with_state(pipeline, admission_middleware))
        .layer(cors_layer(&config.security));

    let gated = if config.security.enable_headers {
        gated.layer(middleware::map_response(security_headers))
    } else {
        gated
    };

    // 5xx rejections are logged by the admission observer already.
    let trace = TraceLayer::new_for_http()
        .on_request(DefaultOnRequest::new().level(Level::TRACE))
        .on_response(DefaultOnResponse::new().level(Level::TRACE))
        .on_failure(DefaultOnFailure::new().level(Level::DEBUG));

    gated.layer(
        ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(trace)
            .layer(propagate_request_id_layer()),
    )
}

async fn not_found() -> ErrorEnvelope {
    ErrorEnvelope::new(StatusCode::NOT_FOUND, "Not found")
}
