//! SSE wire protocol for ORBIT's `/v1/chat` stream: event type + envelope injection.
//!
//! This crate defines the wire shape of a single SSE event and its envelope. It does
//! not depend on `orbit-core`; `orbit-core::pipeline` bridges internal stream chunks
//! into [`StreamEvent`] and calls [`to_json`]/[`to_sse_line`].

pub mod envelope;
pub mod event;

pub use envelope::{to_json, to_sse_line, Envelope, EnvelopeState, SSE_DONE_LINE};
pub use event::StreamEvent;
