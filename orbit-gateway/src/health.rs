//! `/health`, `/health/adapters`, `/health/adapters/{name}/reset`. The full
//! admin surface is out of scope, so reset is unauthenticated here; a
//! deployment that needs it gated sits an admin-auth layer in front.

use std::sync::atomic::Ordering;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use orbit_core::{CircuitBreakerState, OrbitError};
use serde::Serialize;

use crate::error::ApiError;
use crate::ratelimit;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub draining: bool,
}

#[derive(Serialize)]
pub struct AdapterHealthResponse {
    pub adapters: Vec<CircuitBreakerState>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", axum::routing::get(get_health))
        .route("/health/adapters", axum::routing::get(get_health_adapters))
        .route("/health/adapters/:name/reset", axum::routing::post(post_reset_adapter))
}

async fn get_health(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let verdict = ratelimit::enforce(&state, "/health", &headers, None).await;
    let mut resp = Json(HealthResponse {
        status: "ok",
        draining: state.draining.load(Ordering::Relaxed),
    })
    .into_response();
    ratelimit::apply_headers(&mut resp, &verdict);
    resp
}

async fn get_health_adapters(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let verdict = ratelimit::enforce(&state, "/health/adapters", &headers, None).await;
    let mut resp = Json(AdapterHealthResponse {
        adapters: state.breakers.snapshot_all(),
    })
    .into_response();
    ratelimit::apply_headers(&mut resp, &verdict);
    resp
}

async fn post_reset_adapter(State(state): State<AppState>, headers: HeaderMap, Path(name): Path<String>) -> Response {
    let verdict = ratelimit::enforce(&state, "/health/adapters/reset", &headers, None).await;
    let mut resp = match reset(state, &name) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => ApiError(e).into_response(),
    };
    ratelimit::apply_headers(&mut resp, &verdict);
    resp
}

fn reset(state: AppState, name: &str) -> Result<CircuitBreakerState, OrbitError> {
    if !state.adapters.list().iter().any(|d| d.name == name) {
        return Err(OrbitError::AdapterNotFound(name.to_string()));
    }
    let breaker = state.breakers.get_or_create(name);
    breaker.reset();
    Ok(breaker.snapshot())
}
