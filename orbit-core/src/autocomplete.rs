//! Fuzzy-matches a prefix against an adapter's `nl_examples` corpus.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, InMemoryCache};

const EXAMPLES_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    Substring,
    Levenshtein,
    JaroWinkler,
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::JaroWinkler
    }
}

#[derive(Clone, Debug)]
pub struct Suggestion {
    pub text: String,
    pub score: f64,
}

/// Supplies the raw `nl_examples` corpus for an adapter (or its sub-adapters,
/// for composite adapters). Kept separate from the cache so tests can stub
/// the source without standing up a real adapter registry.
pub trait ExampleSource: Send + Sync {
    fn examples_for(&self, adapter_name: &str) -> Vec<String>;
    /// Sub-adapter names for a composite adapter; empty for a leaf adapter.
    fn sub_adapters(&self, adapter_name: &str) -> Vec<String> {
        let _ = adapter_name;
        vec![]
    }
}

pub struct AutocompleteEngine {
    source: Arc<dyn ExampleSource>,
    cache: InMemoryCache<String, Arc<Vec<String>>>,
    threshold: f64,
}

impl AutocompleteEngine {
    pub fn new(source: Arc<dyn ExampleSource>, threshold: f64) -> Self {
        Self {
            source,
            cache: InMemoryCache::new(),
            threshold,
        }
    }

    /// Fetches (and caches, TTL 30 min) the merged example corpus for
    /// `adapter_name`, recursing into sub-adapters for composite adapters.
    async fn examples_for(&self, adapter_name: &str) -> Arc<Vec<String>> {
        if let Some(cached) = self.cache.get(&adapter_name.to_string()).await {
            return cached;
        }

        let mut merged = self.source.examples_for(adapter_name);
        for sub in self.source.sub_adapters(adapter_name) {
            merged.extend(self.source.examples_for(&sub));
        }
        let merged = Arc::new(merged);
        let _ = self
            .cache
            .set(adapter_name.to_string(), merged.clone(), Some(EXAMPLES_TTL))
            .await;
        merged
    }

    pub async fn suggest(
        &self,
        adapter_name: &str,
        prefix: &str,
        limit: usize,
        mode: MatchMode,
    ) -> Vec<Suggestion> {
        let examples = self.examples_for(adapter_name).await;
        let prefix_lower = prefix.to_lowercase();

        let mut scored: Vec<Suggestion> = examples
            .iter()
            .filter_map(|example| {
                let score = score_example(&prefix_lower, example, mode);
                if score > self.threshold {
                    Some(Suggestion {
                        text: example.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

/// `algorithmic_similarity × 100 − 0.05 × length_penalty`.
/// `length_penalty` is the absolute character-length gap between prefix and
/// candidate, keeping very long candidates from dominating short prefixes.
fn score_example(prefix_lower: &str, example: &str, mode: MatchMode) -> f64 {
    let example_lower = example.to_lowercase();
    let similarity = match mode {
        MatchMode::Substring => substring_similarity(prefix_lower, &example_lower),
        MatchMode::Levenshtein => {
            let max_len = prefix_lower.len().max(example_lower.len()).max(1) as f64;
            1.0 - (strsim::levenshtein(prefix_lower, &example_lower) as f64 / max_len)
        }
        MatchMode::JaroWinkler => strsim::jaro_winkler(prefix_lower, &example_lower),
    };
    let length_penalty = (example_lower.len() as f64 - prefix_lower.len() as f64).abs();
    similarity * 100.0 - 0.05 * length_penalty
}

fn substring_similarity(prefix_lower: &str, example_lower: &str) -> f64 {
    match example_lower.find(prefix_lower) {
        Some(0) => 1.0,
        Some(_) => 0.7,
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        leaf: Vec<(&'static str, Vec<&'static str>)>,
        composites: Vec<(&'static str, Vec<&'static str>)>,
    }

    impl ExampleSource for FixedSource {
        fn examples_for(&self, adapter_name: &str) -> Vec<String> {
            self.leaf
                .iter()
                .find(|(name, _)| *name == adapter_name)
                .map(|(_, examples)| examples.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default()
        }

        fn sub_adapters(&self, adapter_name: &str) -> Vec<String> {
            self.composites
                .iter()
                .find(|(name, _)| *name == adapter_name)
                .map(|(_, subs)| subs.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default()
        }
    }

    fn engine() -> AutocompleteEngine {
        let source = Arc::new(FixedSource {
            leaf: vec![
                ("qa", vec!["what is my account balance", "what are the fees"]),
                ("billing", vec!["when is my invoice due"]),
            ],
            composites: vec![("combo", vec!["qa", "billing"])],
        });
        AutocompleteEngine::new(source, 10.0)
    }

    #[tokio::test]
    async fn prefix_match_scores_highest_for_substring_mode() {
        let engine = engine();
        let suggestions = engine.suggest("qa", "what is", 5, MatchMode::Substring).await;
        assert_eq!(suggestions[0].text, "what is my account balance");
    }

    #[tokio::test]
    async fn jaro_winkler_is_default_and_ranks_close_prefixes_first() {
        let engine = engine();
        let suggestions = engine.suggest("qa", "wat is", 5, MatchMode::JaroWinkler).await;
        assert!(!suggestions.is_empty());
    }

    #[tokio::test]
    async fn composite_adapter_merges_sub_adapter_examples() {
        let engine = engine();
        let suggestions = engine.suggest("combo", "when", 5, MatchMode::Substring).await;
        assert!(suggestions.iter().any(|s| s.text.contains("invoice")));
    }

    #[tokio::test]
    async fn low_score_results_are_discarded_by_threshold() {
        let engine = AutocompleteEngine::new(
            Arc::new(FixedSource {
                leaf: vec![("qa", vec!["completely unrelated text"])],
                composites: vec![],
            }),
            99.0,
        );
        let suggestions = engine.suggest("qa", "zzz", 5, MatchMode::JaroWinkler).await;
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn limit_truncates_results() {
        let source = Arc::new(FixedSource {
            leaf: vec![("qa", vec!["alpha", "alphabet", "alphanumeric"])],
            composites: vec![],
        });
        let engine = AutocompleteEngine::new(source, 0.0);
        let suggestions = engine.suggest("qa", "alpha", 2, MatchMode::Substring).await;
        assert_eq!(suggestions.len(), 2);
    }
}
