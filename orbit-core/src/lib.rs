//! # orbit-core
//!
//! The request-processing engine behind ORBIT, a retrieval-augmented
//! inference server: named worker pools, per-adapter circuit breakers, a
//! fixed-window Redis rate limiter, adapter registry and parallel executor,
//! a multi-variant retriever core, and the six-step pipeline engine that
//! composes them into one cancellable, observable request.
//!
//! ## Main modules
//!
//! - [`pool`]: [`PoolManager`] — named, bounded-concurrency worker pools.
//! - [`breaker`]: [`CircuitBreaker`], [`BreakerRegistry`] — per-adapter Closed/Open/HalfOpen state.
//! - [`ratelimit`]: [`RateLimiter`] — fixed-window Redis counters, fail-open.
//! - [`auth`]: [`AuthMiddleware`] — API-key → adapter binding, session validation, request-id minting.
//! - [`adapter`]: [`AdapterManager`] — adapter descriptor loading, lazy construction, hot-reload.
//! - [`executor`]: [`ParallelAdapterExecutor`] — runs N adapters concurrently under their breakers.
//! - [`retriever`]: [`Retriever`] trait and its vector/SQL/intent-template/HTTP/passthrough variants.
//! - [`pipeline`]: [`PipelineEngine`] — the six-step request pipeline.
//! - [`history`]: [`ChatHistoryService`] — append-only per-session turns.
//! - [`autocomplete`]: [`AutocompleteEngine`] — fuzzy prefix matching over adapter examples.
//! - [`moderation`] / [`reranker`]: pipeline-step collaborators for safety checks and rerank.
//! - [`observability`]: structured logging helpers carrying `request_id`.
//! - [`llm`]: [`LlmClient`] trait, [`MockLlm`], [`ChatOpenAI`].
//! - [`memory`]: vector-backed retrieval storage ([`Store`], [`InMemoryVectorStore`]).
//! - [`cache`]: [`Cache`], [`InMemoryCache`].
//! - [`message`]: [`Message`] (System / User / Assistant).
//! - [`stream`]: [`MessageChunk`] for streaming LLM output.
//! - [`error`]: [`OrbitError`], the taxonomy that crosses module boundaries.

pub mod adapter;
pub mod auth;
pub mod autocomplete;
pub mod breaker;
pub mod cache;
pub mod error;
pub mod executor;
pub mod history;
pub mod llm;
pub mod memory;
pub mod message;
pub mod moderation;
pub mod observability;
pub mod pipeline;
pub mod pool;
pub mod ratelimit;
pub mod reranker;
pub mod retriever;
pub mod stream;

pub use adapter::{
    AdapterCapabilities, AdapterDescriptor, AdapterFactory, AdapterManager, AdapterType,
    RetrievalBehavior,
};
pub use auth::{ApiKeyBinding, AuthContext, AuthMiddleware};
pub use autocomplete::{AutocompleteEngine, ExampleSource, MatchMode, Suggestion};
pub use breaker::{BreakerPolicy, BreakerRegistry, BreakerState, CircuitBreaker, CircuitBreakerState};
pub use cache::{Cache, CacheError, InMemoryCache};
pub use error::{ModerationStage, OrbitError};
pub use executor::{AdapterResult, ExecutionContext, ExecutionStrategy, ExecutorConfig, ParallelAdapterExecutor};
pub use history::{ChatHistoryService, CharsPerTokenEstimate, ConversationTurn, TokenBudgetPolicy};
pub use llm::{ChatOpenAI, LlmClient, LlmResponse, LlmUsage, MockLlm};
pub use memory::{Embedder, InMemoryVectorStore, OpenAIEmbedder, Store, StoreError};
pub use message::Message;
pub use moderation::{KeywordModerator, Moderator, ModerationVerdict};
pub use pipeline::{LanguageDetector, PipelineEngine, PipelineStepsEnabled, ProcessingContext};
pub use pool::{PoolError, PoolManager, PoolStats, DEFAULT_POOLS};
pub use ratelimit::{resolve_client_ip, RateLimitDecision, RateLimiter, Scope, WindowLimit};
pub use reranker::{LexicalOverlapReranker, Reranker, RerankError};
pub use retriever::{
    ContextDocument, ContextDocumentMetadata, HttpAuth, HttpRetriever, HttpRetrieverConfig,
    IntentTemplateRetriever, PassthroughRetriever, RetrievalMeta, RetrievalOutcome,
    RetrievalQuery, Retriever, RetrieverError, SimilarityKind, SqlRetriever, SqlRetrieverConfig,
    VectorRetriever, VectorRetrieverConfig,
};
pub use stream::MessageChunk;
