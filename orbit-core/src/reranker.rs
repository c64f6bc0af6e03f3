//! Optional rerank step: re-scores retrieved documents against the query,
//! preserving original order on failure.

use async_trait::async_trait;

use crate::retriever::ContextDocument;

#[derive(Debug, thiserror::Error)]
pub enum RerankError {
    #[error("reranker backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        docs: Vec<ContextDocument>,
    ) -> Result<Vec<ContextDocument>, RerankError>;
}

/// Runs `reranker` over `docs`; any failure returns the original, unmodified
/// order rather than propagating the error.
pub async fn rerank_or_preserve(
    reranker: &dyn Reranker,
    query: &str,
    docs: Vec<ContextDocument>,
) -> Vec<ContextDocument> {
    let original = docs.clone();
    match reranker.rerank(query, docs).await {
        Ok(reranked) => reranked,
        Err(_) => original,
    }
}

/// Lexical overlap reranker: scores by shared-token count with the query.
/// A minimal, dependency-free default; production deployments swap in a
/// cross-encoder behind the same trait.
pub struct LexicalOverlapReranker;

#[async_trait]
impl Reranker for LexicalOverlapReranker {
    async fn rerank(
        &self,
        query: &str,
        mut docs: Vec<ContextDocument>,
    ) -> Result<Vec<ContextDocument>, RerankError> {
        let query_tokens: std::collections::HashSet<String> =
            query.to_lowercase().split_whitespace().map(String::from).collect();

        docs.sort_by(|a, b| {
            let score_a = overlap_score(&query_tokens, &a.content);
            let score_b = overlap_score(&query_tokens, &b.content);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(docs)
    }
}

fn overlap_score(query_tokens: &std::collections::HashSet<String>, content: &str) -> f64 {
    let content_tokens: std::collections::HashSet<String> =
        content.to_lowercase().split_whitespace().map(String::from).collect();
    query_tokens.intersection(&content_tokens).count() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::ContextDocumentMetadata;

    fn doc(content: &str) -> ContextDocument {
        ContextDocument {
            content: content.to_string(),
            metadata: ContextDocumentMetadata {
                adapter: "test".to_string(),
                source: "test".to_string(),
                chunk_id: None,
                confidence: 1.0,
            },
            score: 0.5,
            truncated_flag: false,
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(
            &self,
            _query: &str,
            _docs: Vec<ContextDocument>,
        ) -> Result<Vec<ContextDocument>, RerankError> {
            Err(RerankError::Backend("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn reorders_by_lexical_overlap() {
        let reranker = LexicalOverlapReranker;
        let docs = vec![doc("nothing relevant here"), doc("rust async tokio runtime")];
        let reranked = rerank_or_preserve(&reranker, "tokio runtime", docs).await;
        assert_eq!(reranked[0].content, "rust async tokio runtime");
    }

    #[tokio::test]
    async fn preserves_order_on_failure() {
        let reranker = FailingReranker;
        let docs = vec![doc("first"), doc("second")];
        let original = docs.clone();
        let result = rerank_or_preserve(&reranker, "q", docs).await;
        assert_eq!(
            result.iter().map(|d| &d.content).collect::<Vec<_>>(),
            original.iter().map(|d| &d.content).collect::<Vec<_>>()
        );
    }
}
