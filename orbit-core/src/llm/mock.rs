//! Fixed-response LLM client for tests.

use async_trait::async_trait;

use super::{LlmClient, LlmResponse};
use crate::error::OrbitError;
use crate::message::Message;

/// Returns a fixed string for every call. Useful for pipeline and executor tests
/// that don't need real model behavior.
pub struct MockLlm {
    pub response: String,
}

impl MockLlm {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _messages: &[Message]) -> Result<LlmResponse, OrbitError> {
        Ok(LlmResponse {
            content: self.response.clone(),
            usage: None,
        })
    }
}
