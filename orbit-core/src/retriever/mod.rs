//! Translates a query into relevance-scored context documents. The
//! [`Retriever`] trait is the capability-typed interface the executor
//! depends on; concrete variants (vector, SQL, intent-template, HTTP,
//! passthrough) are registered by name in the adapter registry.

mod http;
mod intent_template;
mod passthrough;
mod sql;
mod vector;

pub use http::{HttpAuth, HttpRetriever, HttpRetrieverConfig};
pub use intent_template::{IntentTemplateRetriever, TemplateDescriptor, TemplateParameter};
pub use passthrough::PassthroughRetriever;
pub use sql::{SqlRetriever, SqlRetrieverConfig};
pub use vector::{SimilarityKind, VectorRetriever, VectorRetrieverConfig};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, serde::Serialize)]
pub struct ContextDocumentMetadata {
    pub adapter: String,
    pub source: String,
    pub chunk_id: Option<String>,
    pub confidence: f64,
}

/// One piece of retrieved context. Immutable after return.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ContextDocument {
    pub content: String,
    pub metadata: ContextDocumentMetadata,
    pub score: f64,
    pub truncated_flag: bool,
}

/// Bookkeeping for filtering/truncation stages.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct RetrievalStages {
    pub vector: Option<usize>,
    pub confidence: Option<usize>,
    pub domain: Option<usize>,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct RetrievalMeta {
    pub result_count: usize,
    pub total_available: usize,
    pub truncated: bool,
    pub stages: RetrievalStages,
}

/// The request-scoped parameters a retriever needs, echoed from
/// `ProcessingContext`.
#[derive(Clone, Debug, Default)]
pub struct RetrievalQuery {
    pub query: String,
    pub api_key: Option<String>,
    pub session_id: Option<String>,
    pub file_ids: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct RetrievalOutcome {
    pub docs: Vec<ContextDocument>,
    pub meta: RetrievalMeta,
}

#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error("retriever backend error: {0}")]
    Backend(String),
    #[error("retriever timed out")]
    Timeout,
    #[error("retriever not initialized")]
    NotInitialized,
}

/// Capability-typed retrieval interface. `initialize`/`close` are idempotent;
/// `set_collection` selects the working collection where applicable.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn initialize(&self) -> Result<(), RetrieverError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), RetrieverError> {
        Ok(())
    }

    async fn set_collection(&self, _name: &str) -> Result<(), RetrieverError> {
        Ok(())
    }

    /// The hot path: resolves a query into scored context documents.
    async fn get_relevant_context(
        &self,
        query: &RetrievalQuery,
    ) -> Result<RetrievalOutcome, RetrieverError>;
}

/// Clamps `return_results` to `max_results`: a descriptor asking for more
/// results than its own cap allows silently gets the cap instead of erroring.
pub fn clamp_return_results(return_results: usize, max_results: usize) -> usize {
    return_results.min(max_results)
}
