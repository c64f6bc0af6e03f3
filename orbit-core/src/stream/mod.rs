//! Internal streaming types for the pipeline's LLM-inference step.
//!
//! `LlmClient::invoke_stream` emits [`MessageChunk`]s on a bounded channel as the
//! model produces output. The pipeline buffers them (post-validation needs the
//! full text before it can render a verdict) while also forwarding each chunk
//! to the gateway's SSE writer so a client sees incremental output as it
//! arrives; buffering applies only to the moderation verdict, not to delivery
//! latency.

/// One incremental piece of assistant output.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageChunk {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_carries_content() {
        let c = MessageChunk {
            content: "partial".into(),
        };
        assert_eq!(c.content, "partial");
    }
}
