//! End-to-end admission through the full middleware stack.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use request_gate::config::MissingAddressPolicy;
use request_gate::store::MemoryStore;

mod common;
use common::*;

#[tokio::test(start_paused = true)]
async fn test_global_limit_allows_ten_then_rejects() {
    let router = gate_router_from(&test_config(), Arc::new(MemoryStore::new()), "10.0.0.1:5000");

    for _ in 0..10 {
        assert_eq!(get(&router, "/api/health").await.status(), StatusCode::OK);
    }

    let response = get(&router, "/api/health").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "1");

    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({
            "message": "Too many requests",
            "error": { "message": "Too many requests", "status": 429 }
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_global_limit_refills() {
    let router = gate_router_from(&test_config(), Arc::new(MemoryStore::new()), "10.0.0.1:5000");

    for _ in 0..10 {
        get(&router, "/api/health").await;
    }
    assert_eq!(get(&router, "/api/health").await.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(get(&router, "/api/health").await.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_spaced_requests_still_capped_within_one_second() {
    let router = gate_router_from(&test_config(), Arc::new(MemoryStore::new()), "10.0.0.1:5000");

    for _ in 0..10 {
        assert_eq!(get(&router, "/api/health").await.status(), StatusCode::OK);
        tokio::time::advance(Duration::from_millis(90)).await;
    }

    let response = get(&router, "/api/health").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "1");
}

#[tokio::test(start_paused = true)]
async fn test_clients_are_isolated() {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let first = gate_router_from(&config, store.clone(), "10.0.0.1:5000");
    let second = gate_router_from(&config, store, "10.0.0.2:5000");

    for _ in 0..10 {
        get(&first, "/api/health").await;
    }
    assert_eq!(get(&first, "/api/health").await.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(get(&second, "/api/health").await.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_sensitive_quota_and_retry_after() {
    let mut config = test_config();
    config.global_limit.points = 10_000;
    let router = gate_router_from(&config, Arc::new(MemoryStore::new()), "10.0.0.1:5000");

    for n in 1..=100u64 {
        let response = get(&router, "/api/v1/x").await;
        // No handler behind /api/v1/x: admitted requests fall through to 404.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["ratelimit-limit"], "100");
        assert_eq!(response.headers()["ratelimit-remaining"], (100 - n).to_string().as_str());
        assert_eq!(response.headers()["ratelimit-policy"], "100;w=900");
    }

    tokio::time::advance(Duration::from_secs(60)).await;

    let response = get(&router, "/api/v1/x").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "840");
    assert_eq!(response.headers()["ratelimit-remaining"], "0");

    let envelope = envelope(response).await;
    assert_eq!(envelope.message, "Too many requests");
    assert_eq!(envelope.error.status, 429);

    // Outside the scope the same client is still served.
    assert_eq!(get(&router, "/api/health").await.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_non_sensitive_paths_leave_no_window_state() {
    let store = Arc::new(MemoryStore::new());
    let router = gate_router_from(&test_config(), store.clone(), "10.0.0.1:5000");

    let response = get(&router, "/api/health").await;
    assert!(response.headers().get("ratelimit-limit").is_none());

    get(&router, "/api/v10/users").await;
    get(&router, "/other").await;

    assert!(store.keys_with_prefix("rate-limit:").is_empty());
    assert!(store.contains_key("middleware:10.0.0.1"));
}

#[tokio::test(start_paused = true)]
async fn test_scope_root_without_trailing_slash_is_limited() {
    let store = Arc::new(MemoryStore::new());
    let router = gate_router_from(&test_config(), store.clone(), "10.0.0.1:5000");

    let response = get(&router, "/api/v1").await;
    assert_eq!(response.headers()["ratelimit-remaining"], "99");
    assert!(store.contains_key("rate-limit:10.0.0.1"));
}

#[tokio::test(start_paused = true)]
async fn test_echo_behind_both_limiters() {
    let router = gate_router_from(&test_config(), Arc::new(MemoryStore::new()), "10.0.0.1:5000");

    let response = post_json(&router, "/api/v1/echo", json!({ "ride": 7 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["ratelimit-remaining"], "99");
    assert_eq!(body_json(response).await, json!({ "echo": { "ride": 7 } }));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_body_uses_envelope() {
    let router = gate_router_from(&test_config(), Arc::new(MemoryStore::new()), "10.0.0.1:5000");

    let response = post_raw(&router, "/api/v1/echo", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(envelope(response).await.error.status, 400);
}

#[tokio::test(start_paused = true)]
async fn test_missing_peer_shares_one_bucket() {
    let store = Arc::new(MemoryStore::new());
    let router = gate_router(&test_config(), store.clone());

    for _ in 0..10 {
        assert_eq!(get(&router, "/api/health").await.status(), StatusCode::OK);
    }
    assert_eq!(get(&router, "/api/health").await.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(store.contains_key("middleware:"));
}

#[tokio::test]
async fn test_missing_peer_rejected_when_configured() {
    let mut config = test_config();
    config.identity.missing_address = MissingAddressPolicy::Reject;
    let router = gate_router(&config, Arc::new(MemoryStore::new()));

    let response = get(&router, "/api/health").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(envelope(response).await.error.status, 400);
}

#[tokio::test(start_paused = true)]
async fn test_rejections_carry_request_id_and_security_headers() {
    let mut config = test_config();
    config.global_limit.points = 1;
    let router = gate_router_from(&config, Arc::new(MemoryStore::new()), "10.0.0.1:5000");

    get(&router, "/api/health").await;
    let response = get(&router, "/api/health").await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
