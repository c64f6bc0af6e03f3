//! Envelope (request_id) and SSE line formatting for the `/v1/chat` stream.
//!
//! `EnvelopeState` tracks the per-stream sequence number and injects `request_id`
//! into each event's JSON without overwriting fields the event already carries.

use crate::event::StreamEvent;
use serde_json::Value;

/// Envelope fields attached to every SSE payload: `request_id` is constant per
/// stream, `event_id` is a monotonically increasing per-stream sequence number.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    pub request_id: Option<String>,
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.request_id {
            obj.entry("request_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one `/v1/chat` stream: request_id plus next event_id.
pub struct EnvelopeState {
    pub request_id: String,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            next_event_id: 1,
        }
    }

    /// Injects the envelope into the event value and advances the sequence.
    pub fn inject_into(&mut self, value: &mut Value) {
        let env = Envelope::new()
            .with_request_id(&self.request_id)
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
    }
}

/// Converts a stream event to JSON and injects the envelope using the given state.
pub fn to_json(event: &StreamEvent, state: &mut EnvelopeState) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}

/// Formats one SSE `data:` line (including the trailing blank line) for a JSON value.
pub fn to_sse_line(value: &Value) -> String {
    format!("data: {}\n\n", value)
}

/// The terminal SSE line for a `/v1/chat` stream, sent after the final event.
pub const SSE_DONE_LINE: &str = "data: [DONE]\n\n";
