//! The ordered step executor producing a `ProcessingContext` through
//! safety → lang-detect → retrieval → rerank → inference → post-validate.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::adapter::AdapterManager;
use crate::error::{ModerationStage, OrbitError};
use crate::executor::{ExecutionContext, ExecutionStrategy, ParallelAdapterExecutor};
use crate::history::ChatHistoryService;
use crate::llm::{LlmClient, LlmResponse};
use crate::message::Message;
use crate::moderation::{enforce, Moderator};
use crate::pool::PoolManager;
use crate::reranker::{rerank_or_preserve, Reranker};
use crate::retriever::{ContextDocument, RetrievalMeta, RetrievalQuery};
use crate::stream::MessageChunk;

/// Per-request value threaded through the pipeline; only the owning step
/// mutates its field.
#[derive(Clone, Debug)]
pub struct ProcessingContext {
    pub request_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub api_key_fingerprint: Option<String>,
    pub adapter_name: String,
    pub message: String,
    pub history: Vec<Message>,
    pub file_ids: Vec<String>,
    pub detected_language: Option<String>,
    pub retrieved_docs: Vec<ContextDocument>,
    pub retrieval_meta: RetrievalMeta,
    pub llm_response: Option<String>,
    pub errors: Vec<String>,
}

impl ProcessingContext {
    pub fn new(request_id: impl Into<String>, adapter_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            session_id: None,
            user_id: None,
            api_key_fingerprint: None,
            adapter_name: adapter_name.into(),
            message: message.into(),
            history: vec![],
            file_ids: vec![],
            detected_language: None,
            retrieved_docs: vec![],
            retrieval_meta: RetrievalMeta::default(),
            llm_response: None,
            errors: vec![],
        }
    }
}

/// Which of the six steps are active for a given pipeline run. A disabled
/// step is skipped entirely; it never alters downstream behavior beyond not
/// producing its output fields.
#[derive(Clone, Debug)]
pub struct PipelineStepsEnabled {
    pub safety_pre: bool,
    pub lang_detect: bool,
    pub retrieval: bool,
    pub rerank: bool,
    pub post_validate: bool,
}

impl Default for PipelineStepsEnabled {
    fn default() -> Self {
        Self {
            safety_pre: true,
            lang_detect: true,
            retrieval: true,
            rerank: false,
            post_validate: true,
        }
    }
}

/// Detects the message's language. The default is a trivial ASCII-letter
/// heuristic; production deployments plug in a real language identifier
/// behind the same trait. A non-result never fails the pipeline; it just
/// falls back to English.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<String>;
}

pub struct AsciiEnglishDetector;

impl LanguageDetector for AsciiEnglishDetector {
    fn detect(&self, text: &str) -> Option<String> {
        if text.is_ascii() {
            Some("en".to_string())
        } else {
            None
        }
    }
}

pub struct PipelineEngine {
    adapters: Arc<AdapterManager>,
    executor: Arc<ParallelAdapterExecutor>,
    history: Arc<ChatHistoryService>,
    llm: Arc<dyn LlmClient>,
    moderator: Arc<dyn Moderator>,
    reranker: Arc<dyn Reranker>,
    language_detector: Arc<dyn LanguageDetector>,
    pools: Arc<PoolManager>,
    steps: PipelineStepsEnabled,
}

impl PipelineEngine {
    pub fn new(
        adapters: Arc<AdapterManager>,
        executor: Arc<ParallelAdapterExecutor>,
        history: Arc<ChatHistoryService>,
        llm: Arc<dyn LlmClient>,
        moderator: Arc<dyn Moderator>,
        reranker: Arc<dyn Reranker>,
        language_detector: Arc<dyn LanguageDetector>,
        pools: Arc<PoolManager>,
        steps: PipelineStepsEnabled,
    ) -> Self {
        Self {
            adapters,
            executor,
            history,
            llm,
            moderator,
            reranker,
            language_detector,
            pools,
            steps,
        }
    }

    /// Runs all six steps, short-circuiting on a pre-moderation refusal.
    /// `chunk_tx` is forwarded to the LLM call for streaming delivery; full
    /// output is still buffered for post-validation regardless — buffering
    /// applies to the moderation verdict, not to delivery latency.
    pub async fn run(
        &self,
        mut ctx: ProcessingContext,
        adapter_names: &[String],
        strategy: ExecutionStrategy,
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> ProcessingContext {
        // Step 1: safety (pre).
        if self.steps.safety_pre {
            if let Err(e) = enforce(self.moderator.as_ref(), &ctx.message, ModerationStage::Pre).await {
                ctx.errors.push(e.to_string());
                ctx.llm_response = Some(refusal_text());
                return ctx;
            }
        }

        // Step 2: language detection. A non-result never fails the pipeline.
        if self.steps.lang_detect {
            ctx.detected_language = self
                .language_detector
                .detect(&ctx.message)
                .or_else(|| Some("en".to_string()));
        }

        // Step 3: context retrieval.
        if self.steps.retrieval && !adapter_names.is_empty() {
            let query = RetrievalQuery {
                query: ctx.message.clone(),
                api_key: None,
                session_id: ctx.session_id.clone(),
                file_ids: ctx.file_ids.clone(),
            };
            let exec_ctx = ExecutionContext {
                request_id: ctx.request_id.clone(),
                session_id: ctx.session_id.clone(),
                user_id: ctx.user_id.clone(),
                trace_id: None,
                correlation_id: None,
                file_ids: ctx.file_ids.clone(),
                api_key_fingerprint: ctx.api_key_fingerprint.clone(),
            };
            let results = self.executor.execute(&query, adapter_names, &exec_ctx, strategy).await;

            let mut docs = Vec::new();
            let mut result_count = 0;
            let mut total_available = 0;
            let mut truncated = false;
            for result in results {
                if let Some(err) = &result.error {
                    ctx.errors.push(format!("{}: {err}", result.adapter_name));
                    continue;
                }
                result_count += result.meta.result_count;
                total_available += result.meta.total_available;
                truncated |= result.meta.truncated;
                docs.extend(result.data);
            }
            ctx.retrieved_docs = docs;
            ctx.retrieval_meta = RetrievalMeta {
                result_count,
                total_available,
                truncated,
                stages: Default::default(),
            };
        }

        // Step 4: rerank (optional, order-preserving on failure).
        if self.steps.rerank && !ctx.retrieved_docs.is_empty() {
            ctx.retrieved_docs =
                rerank_or_preserve(self.reranker.as_ref(), &ctx.message, std::mem::take(&mut ctx.retrieved_docs)).await;
        }

        // Step 5: LLM inference.
        let prompt = self.build_prompt(&ctx);
        let llm = self.llm.clone();
        let llm_result = self
            .pools
            .run_in_pool("inference", async move { llm.invoke_stream(&prompt, chunk_tx).await })
            .await;
        let llm_result = match llm_result {
            Ok(r) => r,
            Err(e) => {
                ctx.errors.push(e.to_string());
                ctx.llm_response = Some(refusal_text());
                return ctx;
            }
        };
        let response_text = match llm_result {
            Ok(LlmResponse { content, .. }) => content,
            Err(e) => {
                ctx.errors.push(e.to_string());
                ctx.llm_response = Some(refusal_text());
                return ctx;
            }
        };

        // Step 6: post-validation.
        if self.steps.post_validate {
            match enforce(self.moderator.as_ref(), &response_text, ModerationStage::Post).await {
                Ok(_) => ctx.llm_response = Some(response_text),
                Err(e) => {
                    ctx.errors.push(e.to_string());
                    ctx.llm_response = Some(refusal_text());
                }
            }
        } else {
            ctx.llm_response = Some(response_text);
        }

        if let Some(session_id) = ctx.session_id.clone() {
            self.history.add_conversation_turn(
                &session_id,
                Message::User(ctx.message.clone()),
                Message::Assistant(ctx.llm_response.clone().unwrap_or_default()),
                ctx.file_ids.clone(),
                adapter_names.to_vec(),
            );
        }

        ctx
    }

    /// `[system_prompt, history_window, retrieval_block?, user_message]`,
    /// with a language directive appended to the system prompt when a
    /// non-English language was detected.
    fn build_prompt(&self, ctx: &ProcessingContext) -> Vec<Message> {
        let mut messages = Vec::new();

        let mut system_prompt = String::from("You are a helpful assistant.");
        let needs_language_directive =
            matches!(&ctx.detected_language, Some(lang) if lang != "en");
        if needs_language_directive {
            let lang = ctx.detected_language.as_deref().unwrap_or("en");
            system_prompt.push_str(&format!(" Respond in {lang}."));
        }
        messages.push(Message::System(system_prompt));

        if let Some(session_id) = &ctx.session_id {
            let window = self.history.history_window(session_id, 2000);
            for turn in window {
                messages.push(turn.user);
                messages.push(turn.assistant);
            }
        }

        if !ctx.retrieved_docs.is_empty() {
            let block = ctx
                .retrieved_docs
                .iter()
                .map(|d| d.content.as_str())
                .collect::<Vec<_>>()
                .join("\n---\n");
            messages.push(Message::System(format!("Context:\n{block}")));
        }

        messages.push(Message::User(ctx.message.clone()));
        messages
    }
}

fn refusal_text() -> String {
    "I can't help with that request.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterFactory;
    use crate::breaker::{BreakerPolicy, BreakerRegistry};
    use crate::history::CharsPerTokenEstimate;
    use crate::llm::MockLlm;
    use crate::moderation::KeywordModerator;
    use crate::pool::PoolManager;
    use crate::reranker::LexicalOverlapReranker;
    use std::collections::HashMap;

    fn engine() -> PipelineEngine {
        let breakers = Arc::new(BreakerRegistry::new(BreakerPolicy::default()));
        let adapters = Arc::new(AdapterManager::new(vec![], HashMap::<String, AdapterFactory>::new(), HashMap::new(), breakers.clone()).unwrap());
        let pools = Arc::new(PoolManager::with_defaults());
        let executor = Arc::new(ParallelAdapterExecutor::new(
            adapters.clone(),
            breakers,
            pools.clone(),
            Default::default(),
        ));
        let history = Arc::new(ChatHistoryService::new(Box::new(CharsPerTokenEstimate::default())));
        let llm = Arc::new(MockLlm::new("mock response"));
        let moderator = Arc::new(KeywordModerator::new(vec!["forbidden".to_string()]));
        let reranker = Arc::new(LexicalOverlapReranker);
        let detector = Arc::new(AsciiEnglishDetector);

        PipelineEngine::new(
            adapters,
            executor,
            history,
            llm,
            moderator,
            reranker,
            detector,
            pools,
            PipelineStepsEnabled::default(),
        )
    }

    #[tokio::test]
    async fn happy_path_produces_llm_response() {
        let engine = engine();
        let ctx = ProcessingContext::new("req-1", "default", "hello there");
        let result = engine.run(ctx, &[], ExecutionStrategy::All, None).await;
        assert_eq!(result.llm_response.as_deref(), Some("mock response"));
        assert!(result.errors.is_empty());
        assert_eq!(result.detected_language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn pre_moderation_short_circuits_to_refusal() {
        let engine = engine();
        let ctx = ProcessingContext::new("req-2", "default", "this is forbidden content");
        let result = engine.run(ctx, &[], ExecutionStrategy::All, None).await;
        assert_eq!(result.llm_response.as_deref(), Some("I can't help with that request."));
        assert!(!result.errors.is_empty());
    }

    #[tokio::test]
    async fn session_turn_is_recorded_in_history() {
        let engine = engine();
        let ctx = {
            let mut c = ProcessingContext::new("req-3", "default", "hi");
            c.session_id = Some("s1".to_string());
            c
        };
        engine.run(ctx, &[], ExecutionStrategy::All, None).await;
        let history = engine.history.get_conversation_history("s1", 10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user.content(), "hi");
    }
}
