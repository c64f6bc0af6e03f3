//! LLM client abstraction used by the pipeline's inference step and by
//! the intent-template retriever's parameter-extraction call.
//!
//! # Streaming
//!
//! `invoke_stream()` accepts an optional `Sender<MessageChunk>` for emitting
//! tokens as they arrive. Implementations that support streaming (`ChatOpenAI`)
//! send chunks through the channel; others (`MockLlm`) fall back to the default
//! implementation, which calls `invoke()` and sends the full content as one chunk.

mod mock;
mod openai;

pub use mock::MockLlm;
pub use openai::ChatOpenAI;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::OrbitError;
use crate::message::Message;
use crate::stream::MessageChunk;

/// Token usage for one LLM call (prompt + completion).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from an LLM completion.
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<LlmUsage>,
}

/// LLM client: given messages, returns assistant text.
///
/// Implementations: [`MockLlm`] (fixed response, for tests), [`ChatOpenAI`]
/// (any OpenAI-compatible chat completion endpoint).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke one turn: read messages, return assistant content.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, OrbitError>;

    /// Streaming variant with optional chunk sender for token streaming.
    ///
    /// Default implementation calls `invoke()` and sends the full content as
    /// one chunk if streaming is enabled.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmResponse, OrbitError> {
        let response = self.invoke(messages).await?;

        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                let _ = tx
                    .send(MessageChunk {
                        content: response.content.clone(),
                    })
                    .await;
            }
        }

        Ok(response)
    }
}
