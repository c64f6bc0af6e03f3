//! `POST /v1/chat` and `POST /v1/chat/stop`: the HTTP front door onto the
//! pipeline engine. Streaming responses buffer the full turn before emitting
//! SSE chunks, since post-validation moderates the complete output before
//! the response envelope is finalized.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use orbit_core::{ExecutionStrategy, OrbitError, ProcessingContext};
use orbit_stream::{to_sse_line, EnvelopeState, StreamEvent, SSE_DONE_LINE};

use crate::error::ApiError;
use crate::ratelimit::{self, Verdict};
use crate::state::AppState;

#[derive(Deserialize, Clone)]
pub struct ChatMessage {
    #[allow(dead_code)]
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub request_id: String,
    pub response: String,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct StopRequest {
    #[allow(dead_code)]
    pub session_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/chat", axum::routing::post(post_chat))
        .route("/v1/chat/stop", axum::routing::post(post_chat_stop))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn post_chat(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<ChatRequest>) -> Response {
    let api_key = header_str(&headers, "x-api-key");
    let verdict = ratelimit::enforce(&state, "/v1/chat", &headers, api_key).await;
    if let Verdict::Limited(decision) = &verdict {
        let mut resp = ApiError(OrbitError::RateLimited {
            retry_after_secs: decision.retry_after_secs.unwrap_or(60),
        })
        .into_response();
        ratelimit::apply_headers(&mut resp, &verdict);
        return resp;
    }

    let mut response = match handle_chat(&state, &headers, req).await {
        Ok(response) => response,
        Err(e) => ApiError(e).into_response(),
    };
    ratelimit::apply_headers(&mut response, &verdict);
    response
}

async fn handle_chat(state: &AppState, headers: &HeaderMap, req: ChatRequest) -> Result<Response, OrbitError> {
    let api_key = header_str(headers, "x-api-key");
    let session_id = header_str(headers, "x-session-id")
        .map(str::to_string)
        .or_else(|| req.session_id.clone());
    let user_id = header_str(headers, "x-user-id").map(str::to_string);

    let auth_ctx = state.auth.authenticate(api_key, session_id, user_id, None)?;

    let user_message = req
        .messages
        .last()
        .map(|m| m.content.clone())
        .ok_or_else(|| OrbitError::Validation("messages must not be empty".to_string()))?;

    let mut ctx = ProcessingContext::new(auth_ctx.request_id.clone(), auth_ctx.adapter_name.clone(), user_message);
    ctx.session_id = auth_ctx.session_id.clone();
    ctx.user_id = auth_ctx.user_id.clone();
    ctx.api_key_fingerprint = auth_ctx.api_key_fingerprint.clone();
    ctx.file_ids = req.file_ids.clone();

    let adapter_names = vec![auth_ctx.adapter_name.clone()];
    let result = state
        .pipeline
        .run(ctx, &adapter_names, ExecutionStrategy::All, None)
        .await;

    let response_text = result.llm_response.clone().unwrap_or_default();

    let mut response = if req.stream {
        stream_response(auth_ctx.request_id.clone(), response_text).into_response()
    } else {
        Json(ChatResponse {
            request_id: auth_ctx.request_id.clone(),
            response: response_text,
            errors: result.errors,
        })
        .into_response()
    };
    response.headers_mut().insert(
        "x-request-id",
        axum::http::HeaderValue::from_str(&auth_ctx.request_id).expect("uuid is valid header bytes"),
    );
    Ok(response)
}

/// Chunks `text` into word-boundary pieces and emits them as SSE `delta`
/// events, followed by `done` and the `[DONE]` terminator line.
fn stream_response(request_id: String, text: String) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut envelope = EnvelopeState::new(request_id);
    let mut lines = Vec::new();

    for word in text.split_inclusive(' ') {
        let value = orbit_stream::to_json(&StreamEvent::delta(word), &mut envelope).expect("stream event serializes");
        lines.push(to_sse_line(&value));
    }
    let done_value = orbit_stream::to_json(&StreamEvent::Done, &mut envelope).expect("stream event serializes");
    lines.push(to_sse_line(&done_value));
    lines.push(SSE_DONE_LINE.to_string());

    let events = stream::iter(lines.into_iter().map(|line| Ok(Event::default().data(line))));
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Client-disconnect cancellation is handled by the connection dropping the
/// SSE stream; this endpoint acknowledges an explicit stop request for
/// clients that can't rely on transport-level disconnect.
async fn post_chat_stop(State(_state): State<AppState>, Json(_req): Json<StopRequest>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "stopped": true }))
}
