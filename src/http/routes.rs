//! Built-in route handlers.
//!
//! The gate ships only what it needs to be runnable on its own: a health
//! probe outside the sensitive scope and an echo endpoint inside it.
//! Deployments mount their own handlers with [`GateServer::with_routes`].
//!
//! [`GateServer::with_routes`]: crate::http::GateServer::with_routes

use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::response::AppError;

/// `/api/health` and `/api/v1/echo`.
pub fn default_routes() -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/v1/echo", post(echo))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn echo(payload: Result<Json<Value>, JsonRejection>) -> Result<Json<Value>, AppError> {
    let Json(body) = payload?;
    Ok(Json(json!({ "echo": body })))
}
