//! HTTP retriever variant: async HTTP client with connection
//! pooling, per-request timeout, bounded retries with exponential backoff,
//! and pluggable auth.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{
    ContextDocument, ContextDocumentMetadata, Retriever, RetrievalMeta, RetrievalOutcome,
    RetrievalQuery, RetrieverError,
};

#[derive(Clone, Debug)]
pub enum HttpAuth {
    None,
    Bearer(String),
    ApiKeyHeader { header: String, value: String },
    Basic { username: String, password: String },
}

#[derive(Clone, Debug)]
pub struct HttpRetrieverConfig {
    pub adapter_name: String,
    pub url: String,
    pub auth: HttpAuth,
    pub timeout: Duration,
    pub max_retries: u32,
}

pub struct HttpRetriever {
    client: Client,
    config: HttpRetrieverConfig,
}

impl HttpRetriever {
    pub fn new(config: HttpRetrieverConfig) -> Result<Self, RetrieverError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RetrieverError::Backend(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            HttpAuth::None => builder,
            HttpAuth::Bearer(token) => builder.bearer_auth(token),
            HttpAuth::ApiKeyHeader { header, value } => builder.header(header, value),
            HttpAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
        }
    }

    async fn execute_with_retries(&self, query: &str) -> Result<serde_json::Value, RetrieverError> {
        let mut attempt = 0;
        loop {
            let request = self
                .apply_auth(self.client.get(&self.config.url))
                .query(&[("q", query)]);

            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| RetrieverError::Backend(e.to_string()));
                }
                Ok(resp) if resp.status().is_server_error() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Ok(resp) => {
                    return Err(RetrieverError::Backend(format!(
                        "http retriever got status {}",
                        resp.status()
                    )))
                }
                Err(e) if attempt < self.config.max_retries && (e.is_connect() || e.is_timeout()) => {
                    attempt += 1;
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(RetrieverError::Backend(e.to_string())),
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(50 * 2u64.pow(attempt))
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn get_relevant_context(
        &self,
        query: &RetrievalQuery,
    ) -> Result<RetrievalOutcome, RetrieverError> {
        let body = self.execute_with_retries(&query.query).await?;
        let items = body.as_array().cloned().unwrap_or_default();
        let total_available = items.len();

        let docs: Vec<ContextDocument> = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| ContextDocument {
                content: item.to_string(),
                metadata: ContextDocumentMetadata {
                    adapter: self.config.adapter_name.clone(),
                    source: format!("http-{i}"),
                    chunk_id: None,
                    confidence: 1.0,
                },
                score: 1.0,
                truncated_flag: false,
            })
            .collect();

        Ok(RetrievalOutcome {
            meta: RetrievalMeta {
                result_count: docs.len(),
                total_available,
                truncated: false,
                stages: Default::default(),
            },
            docs,
        })
    }
}
