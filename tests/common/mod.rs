//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Method, Request, Response},
    Router,
};
use tower::ServiceExt;

use request_gate::config::{GateConfig, StoreBackend};
use request_gate::http::{routes::default_routes, ErrorEnvelope, GateServer};
use request_gate::store::MemoryStore;
use request_gate::AdmissionPipeline;

/// Config with the in-memory store and an ephemeral port.
pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.store.backend = StoreBackend::Memory;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Fully layered router on `store`, without a peer address.
pub fn gate_router(config: &GateConfig, store: Arc<MemoryStore>) -> Router {
    let pipeline = Arc::new(AdmissionPipeline::from_config(store, config));
    GateServer::with_routes(config, pipeline, default_routes()).router()
}

/// Application `routes` behind the gate, seen from `peer`.
pub fn gated_routes(config: &GateConfig, routes: Router, peer: &str) -> Router {
    let peer: SocketAddr = peer.parse().expect("peer address");
    let pipeline = Arc::new(AdmissionPipeline::from_config(Arc::new(MemoryStore::new()), config));
    GateServer::with_routes(config, pipeline, routes)
        .router()
        .layer(MockConnectInfo(peer))
}

/// Router that sees every request as coming from `peer`.
pub fn gate_router_from(config: &GateConfig, store: Arc<MemoryStore>, peer: &str) -> Router {
    let peer: SocketAddr = peer.parse().expect("peer address");
    gate_router(config, store).layer(MockConnectInfo(peer))
}

pub async fn send(router: &Router, method: Method, path: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(Request::builder().method(method).uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn get(router: &Router, path: &str) -> Response<Body> {
    send(router, Method::GET, path).await
}

pub async fn post_json(router: &Router, path: &str, body: serde_json::Value) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_raw(router: &Router, path: &str, body: &'static str) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn envelope(response: Response<Body>) -> ErrorEnvelope {
    serde_json::from_value(body_json(response).await).unwrap()
}
