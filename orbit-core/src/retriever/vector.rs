//! Vector retriever variant: embed → top-K similarity search →
//! multi-stage filtering (confidence, domain) → truncation to `return_results`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    clamp_return_results, ContextDocument, ContextDocumentMetadata, Retriever, RetrievalMeta,
    RetrievalOutcome, RetrievalQuery, RetrievalStages, RetrieverError,
};
use crate::memory::{Namespace, SearchOptions, Store};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimilarityKind {
    /// `1 / (1 + d/s)` where `d` is a native L2 distance and `s` a scale factor.
    L2Scaled { scale: f64 },
    /// Backend already returns cosine/inner-product similarity in [0, 1]-ish range.
    Native,
    /// Pinecone-style: backend similarity is used directly, no transform.
    DirectSimilarity,
}

#[derive(Clone, Debug)]
pub struct VectorRetrieverConfig {
    pub adapter_name: String,
    pub namespace: Namespace,
    pub confidence_threshold: f64,
    pub return_results: usize,
    pub max_results: usize,
    pub similarity: SimilarityKind,
}

/// Domain-filter predicate supplied by the adapter descriptor.
pub type DomainFilter = Arc<dyn Fn(&ContextDocument) -> bool + Send + Sync>;

pub struct VectorRetriever {
    store: Arc<dyn Store>,
    config: VectorRetrieverConfig,
    domain_filter: Option<DomainFilter>,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn Store>, config: VectorRetrieverConfig) -> Self {
        Self {
            store,
            config,
            domain_filter: None,
        }
    }

    pub fn with_domain_filter(mut self, filter: DomainFilter) -> Self {
        self.domain_filter = Some(filter);
        self
    }

    fn similarity_from_raw(&self, raw_distance_or_score: f64) -> f64 {
        match self.config.similarity {
            SimilarityKind::L2Scaled { scale } => 1.0 / (1.0 + raw_distance_or_score / scale),
            SimilarityKind::Native | SimilarityKind::DirectSimilarity => raw_distance_or_score,
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn get_relevant_context(
        &self,
        query: &RetrievalQuery,
    ) -> Result<RetrievalOutcome, RetrieverError> {
        let return_results = clamp_return_results(self.config.return_results, self.config.max_results);

        // Stage 0: raw top-K from the backend. Over-fetch so confidence/domain
        // filtering has candidates to work with before truncating.
        let over_fetch = (return_results * 4).max(return_results + 10);
        let options = SearchOptions::new().with_query(query.query.clone()).with_limit(over_fetch);

        let hits = self
            .store
            .search(&self.config.namespace, options)
            .await
            .map_err(|e| RetrieverError::Backend(e.to_string()))?;

        let k0 = hits.len();

        let mut docs: Vec<ContextDocument> = hits
            .into_iter()
            .map(|hit| {
                let raw_score = hit.score.unwrap_or(0.0);
                let score = self.similarity_from_raw(raw_score).clamp(0.0, 1.0);
                let content = hit
                    .item
                    .value
                    .get("text")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| hit.item.value.to_string());
                ContextDocument {
                    content,
                    metadata: ContextDocumentMetadata {
                        adapter: self.config.adapter_name.clone(),
                        source: hit.item.key.clone(),
                        chunk_id: None,
                        confidence: score,
                    },
                    score,
                    truncated_flag: false,
                }
            })
            .collect();

        docs.retain(|d| d.score >= self.config.confidence_threshold);
        let k1 = docs.len();

        if let Some(filter) = &self.domain_filter {
            docs.retain(|d| filter(d));
        }
        let k2 = docs.len();

        docs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let truncated = k2 > return_results;
        docs.truncate(return_results);
        for d in docs.iter_mut() {
            d.truncated_flag = truncated;
        }
        let k3 = docs.len();

        Ok(RetrievalOutcome {
            docs,
            meta: RetrievalMeta {
                result_count: k3,
                total_available: k0,
                truncated,
                stages: RetrievalStages {
                    vector: Some(k0),
                    confidence: Some(k1),
                    domain: Some(k2),
                },
            },
        })
    }
}
