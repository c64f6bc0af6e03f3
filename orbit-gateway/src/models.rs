//! `GET /v1/models`: lists configured adapters, gated by
//! `general.models_endpoint_enabled`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use orbit_core::{AdapterCapabilities, OrbitError};
use serde::Serialize;

use crate::error::ApiError;
use crate::ratelimit;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ModelEntry {
    pub name: String,
    pub capabilities: AdapterCapabilities,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/models", axum::routing::get(get_models))
}

async fn get_models(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    let verdict = ratelimit::enforce(&state, "/v1/models", &headers, api_key).await;
    let mut resp = match handle(&state) {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => ApiError(e).into_response(),
    };
    ratelimit::apply_headers(&mut resp, &verdict);
    resp
}

fn handle(state: &AppState) -> Result<ModelsResponse, OrbitError> {
    if !state.config.general.models_endpoint_enabled {
        return Err(OrbitError::AdapterNotFound("/v1/models is disabled".to_string()));
    }
    let models = state
        .adapters
        .list()
        .into_iter()
        .map(|d| ModelEntry {
            name: d.name,
            capabilities: d.capabilities,
        })
        .collect();
    Ok(ModelsResponse { models })
}
