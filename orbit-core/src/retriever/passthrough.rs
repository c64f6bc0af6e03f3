//! Passthrough/multimodal retriever variant: no retrieval for
//! pure conversational turns; when `file_ids` are present, queries a
//! file-chunk vector collection restricted to those files.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    ContextDocument, ContextDocumentMetadata, Retriever, RetrievalMeta, RetrievalOutcome,
    RetrievalQuery, RetrieverError,
};
use crate::memory::{SearchOptions, Store};

pub struct PassthroughRetriever {
    adapter_name: String,
    file_chunk_store: Arc<dyn Store>,
    return_results: usize,
}

impl PassthroughRetriever {
    pub fn new(adapter_name: impl Into<String>, file_chunk_store: Arc<dyn Store>, return_results: usize) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            file_chunk_store,
            return_results,
        }
    }
}

#[async_trait]
impl Retriever for PassthroughRetriever {
    async fn get_relevant_context(
        &self,
        query: &RetrievalQuery,
    ) -> Result<RetrievalOutcome, RetrieverError> {
        if query.file_ids.is_empty() {
            return Ok(RetrievalOutcome {
                docs: vec![],
                meta: RetrievalMeta::default(),
            });
        }

        let mut docs = Vec::new();
        let mut total_available = 0;

        // Union of each file's chunk collection.
        for file_id in &query.file_ids {
            let namespace = vec!["files".to_string(), file_id.clone()];
            let options = SearchOptions::new()
                .with_query(query.query.clone())
                .with_limit(self.return_results);
            let hits = self
                .file_chunk_store
                .search(&namespace, options)
                .await
                .map_err(|e| RetrieverError::Backend(e.to_string()))?;
            total_available += hits.len();
            for hit in hits {
                let content = hit
                    .item
                    .value
                    .get("text")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| hit.item.value.to_string());
                let score = hit.score.unwrap_or(1.0).clamp(0.0, 1.0);
                docs.push(ContextDocument {
                    content,
                    metadata: ContextDocumentMetadata {
                        adapter: self.adapter_name.clone(),
                        source: file_id.clone(),
                        chunk_id: Some(hit.item.key.clone()),
                        confidence: score,
                    },
                    score,
                    truncated_flag: false,
                });
            }
        }

        docs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let truncated = docs.len() > self.return_results;
        docs.truncate(self.return_results);
        for d in docs.iter_mut() {
            d.truncated_flag = truncated;
        }

        Ok(RetrievalOutcome {
            meta: RetrievalMeta {
                result_count: docs.len(),
                total_available,
                truncated,
                stages: Default::default(),
            },
            docs,
        })
    }
}
