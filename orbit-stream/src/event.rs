//! Wire-level SSE event types for ORBIT's chat stream.
//!
//! One tagged enum matches the external interface exactly: `{type, content?, error?}`,
//! `type` one of `delta`, `done`, `error`. State-carrying payloads use plain strings;
//! the pipeline is responsible for buffering/moderating before a `Delta` is emitted.

use serde::Serialize;
use serde_json::Value;

/// A single SSE payload emitted to the HTTP client during `/v1/chat` streaming.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of assistant output.
    Delta { content: String },
    /// Terminal event for a successful turn; carries no payload beyond its tag.
    Done,
    /// Terminal event for a failed turn.
    Error { error: String },
}

impl StreamEvent {
    pub fn delta(content: impl Into<String>) -> Self {
        StreamEvent::Delta {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
        }
    }

    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
