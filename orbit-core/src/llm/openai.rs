//! OpenAI-compatible chat completion client, used by the pipeline's inference
//! step and by the intent-template retriever's parameter-extraction call.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::{LlmClient, LlmResponse, LlmUsage};
use crate::error::OrbitError;
use crate::message::Message;
use crate::stream::MessageChunk;

/// Chat client backed by `async-openai`, pointed at any OpenAI-compatible endpoint
/// (configurable base URL so self-hosted/local inference servers work unmodified).
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ChatOpenAI {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(base_url.into());
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    fn to_openai_messages(
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, OrbitError> {
        messages
            .iter()
            .map(|m| match m {
                Message::System(content) => ChatCompletionRequestSystemMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map(Into::into)
                    .map_err(|e| OrbitError::Internal(e.to_string())),
                Message::User(content) => ChatCompletionRequestUserMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map(Into::into)
                    .map_err(|e| OrbitError::Internal(e.to_string())),
                Message::Assistant(content) => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map(Into::into)
                    .map_err(|e| OrbitError::Internal(e.to_string())),
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, OrbitError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(Self::to_openai_messages(messages)?)
            .build()
            .map_err(|e| OrbitError::Internal(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| OrbitError::UpstreamProviderError {
                provider: "openai".to_string(),
                detail: e.to_string(),
            })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OrbitError::UpstreamProviderError {
                provider: "openai".to_string(),
                detail: "no choices returned".to_string(),
            })?;

        let usage = response.usage.map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
        })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmResponse, OrbitError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(Self::to_openai_messages(messages)?)
            .build()
            .map_err(|e| OrbitError::Internal(e.to_string()))?;

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| OrbitError::UpstreamProviderError {
                provider: "openai".to_string(),
                detail: e.to_string(),
            })?;

        let mut full = String::new();
        while let Some(next) = stream.next().await {
            let response = next.map_err(|e| OrbitError::UpstreamProviderError {
                provider: "openai".to_string(),
                detail: e.to_string(),
            })?;
            for choice in response.choices {
                if let Some(delta) = choice.delta.content {
                    full.push_str(&delta);
                    if let Some(ref tx) = chunk_tx {
                        let _ = tx
                            .send(MessageChunk {
                                content: delta.clone(),
                            })
                            .await;
                    }
                }
            }
        }

        Ok(LlmResponse {
            content: full,
            usage: None,
        })
    }
}
