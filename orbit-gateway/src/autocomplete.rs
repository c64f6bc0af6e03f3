//! `GET /v1/autocomplete`: fuzzy prefix suggestions for an adapter's
//! `nl_examples` corpus.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use orbit_core::{MatchMode, OrbitError};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::ratelimit::{self, Verdict};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AutocompleteQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Not part of the documented query contract; accepted so a caller that
    /// serves more than one adapter can still disambiguate which corpus to
    /// search. Defaults to the first adapter that allows autocomplete.
    #[serde(default)]
    pub adapter_name: Option<String>,
}

#[derive(Serialize)]
pub struct AutocompleteResponse {
    pub suggestions: Vec<SuggestionDto>,
}

#[derive(Serialize)]
pub struct SuggestionDto {
    pub text: String,
    pub score: f64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/autocomplete", axum::routing::get(get_autocomplete))
}

async fn get_autocomplete(State(state): State<AppState>, headers: HeaderMap, Query(q): Query<AutocompleteQuery>) -> Response {
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    let verdict = ratelimit::enforce(&state, "/v1/autocomplete", &headers, api_key).await;
    if let Verdict::Limited(decision) = &verdict {
        let mut resp = ApiError(OrbitError::RateLimited {
            retry_after_secs: decision.retry_after_secs.unwrap_or(60),
        })
        .into_response();
        ratelimit::apply_headers(&mut resp, &verdict);
        return resp;
    }

    let mut resp = match handle(&state, q).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => ApiError(e).into_response(),
    };
    ratelimit::apply_headers(&mut resp, &verdict);
    resp
}

async fn handle(state: &AppState, q: AutocompleteQuery) -> Result<AutocompleteResponse, OrbitError> {
    if q.q.trim().is_empty() {
        return Err(OrbitError::Validation("q must not be empty".to_string()));
    }
    let adapter_name = match &q.adapter_name {
        Some(name) => name.clone(),
        None => state
            .adapters
            .list()
            .into_iter()
            .find(|d| d.capabilities.supports_autocomplete)
            .map(|d| d.name)
            .ok_or_else(|| OrbitError::Validation("no adapter supports autocomplete".to_string()))?,
    };
    let limit = q.limit.unwrap_or(state.config.autocomplete.default_limit);
    let mode = match state.config.autocomplete.match_mode.as_str() {
        "substring" => MatchMode::Substring,
        "levenshtein" => MatchMode::Levenshtein,
        _ => MatchMode::JaroWinkler,
    };

    let suggestions = state
        .autocomplete
        .suggest(&adapter_name, &q.q, limit, mode)
        .await
        .into_iter()
        .map(|s| SuggestionDto { text: s.text, score: s.score })
        .collect();

    Ok(AutocompleteResponse { suggestions })
}
