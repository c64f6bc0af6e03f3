//! Wires an [`OrbitConfig`] into a running [`AppState`]: pools, breakers,
//! adapters, auth, rate limiter, autocomplete and the pipeline engine. This
//! is the composition root; every concrete implementation choice that the
//! config leaves generic (which retriever variant, which LLM client) is
//! decided here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use orbit_config::{AdapterConfig, AdapterType as ConfigAdapterType, OrbitConfig};
use orbit_core::{
    AdapterCapabilities, AdapterDescriptor, AdapterFactory, AdapterManager, AdapterType,
    AsciiEnglishDetector, AutocompleteEngine, AuthMiddleware, BreakerPolicy, BreakerRegistry,
    CharsPerTokenEstimate, ChatHistoryService, ChatOpenAI, ExampleSource, ExecutorConfig,
    InMemoryVectorStore, KeywordModerator, LexicalOverlapReranker, LlmClient, MockLlm,
    HttpAuth, HttpRetriever, HttpRetrieverConfig, ParallelAdapterExecutor, PassthroughRetriever,
    PipelineEngine, PipelineStepsEnabled, PoolManager, RateLimiter, Retriever, RetrievalBehavior,
    SimilarityKind, VectorRetriever, VectorRetrieverConfig,
};

use crate::state::AppState;

pub async fn build_app_state(config: OrbitConfig) -> Result<AppState, String> {
    let config = Arc::new(config);

    let pools = Arc::new(PoolManager::with_verbosity(
        [
            ("io".to_string(), config.performance.thread_pools.io),
            ("cpu".to_string(), config.performance.thread_pools.cpu),
            ("inference".to_string(), config.performance.thread_pools.inference),
            ("embedding".to_string(), config.performance.thread_pools.embedding),
            ("db".to_string(), config.performance.thread_pools.db),
        ],
        config.general.verbose,
    ));

    let breakers = Arc::new(BreakerRegistry::new(BreakerPolicy {
        failure_threshold: config.fault_tolerance.failure_threshold,
        success_threshold: config.fault_tolerance.success_threshold,
        recovery_timeout: Duration::from_secs(config.fault_tolerance.recovery_timeout_secs),
        op_timeout: Duration::from_secs(config.fault_tolerance.op_timeout_secs),
    }));
    for (name, over) in &config.fault_tolerance.per_adapter_overrides {
        let base = BreakerPolicy {
            failure_threshold: config.fault_tolerance.failure_threshold,
            success_threshold: config.fault_tolerance.success_threshold,
            recovery_timeout: Duration::from_secs(config.fault_tolerance.recovery_timeout_secs),
            op_timeout: Duration::from_secs(config.fault_tolerance.op_timeout_secs),
        };
        let policy = BreakerPolicy {
            failure_threshold: over.failure_threshold.unwrap_or(base.failure_threshold),
            success_threshold: over.success_threshold.unwrap_or(base.success_threshold),
            recovery_timeout: over
                .recovery_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(base.recovery_timeout),
            op_timeout: over.op_timeout_secs.map(Duration::from_secs).unwrap_or(base.op_timeout),
        };
        breakers.get_or_create_with_policy(name, policy);
    }

    let embedder = Arc::new(orbit_core::OpenAIEmbedder::new(
        config
            .embeddings
            .values()
            .next()
            .map(|e| e.model.clone())
            .unwrap_or_else(|| "text-embedding-3-small".to_string()),
    ));
    let shared_vector_store = Arc::new(InMemoryVectorStore::new(embedder));

    let descriptors: Vec<AdapterDescriptor> = config.adapters.iter().map(to_descriptor).collect();
    let factories = build_factories(shared_vector_store.clone());
    let api_key_bindings: HashMap<String, String> = config
        .api_keys
        .iter()
        .filter(|k| k.active)
        .map(|k| (k.key.clone(), k.adapter_name.clone()))
        .collect();

    let adapters = Arc::new(
        AdapterManager::new(descriptors, factories, api_key_bindings.clone(), breakers.clone())
            .map_err(|e| e.to_string())?,
    );

    let executor = Arc::new(ParallelAdapterExecutor::new(
        adapters.clone(),
        breakers.clone(),
        pools.clone(),
        ExecutorConfig {
            max_concurrent_adapters: config.fault_tolerance.max_concurrent_adapters,
            ..ExecutorConfig::default()
        },
    ));

    let history = Arc::new(ChatHistoryService::new(Box::new(CharsPerTokenEstimate::default())));

    let llm: Arc<dyn LlmClient> = if config.inference.api_key.is_empty() {
        Arc::new(MockLlm::new("ORBIT is not configured with an inference API key."))
    } else if let Some(base_url) = &config.inference.base_url {
        Arc::new(ChatOpenAI::with_base_url(
            config.inference.api_key.clone(),
            base_url.clone(),
            config.inference.model.clone(),
        ))
    } else {
        Arc::new(ChatOpenAI::new(config.inference.api_key.clone(), config.inference.model.clone()))
    };

    let moderator = Arc::new(KeywordModerator::new(vec![]));
    let reranker = Arc::new(LexicalOverlapReranker);
    let language_detector = Arc::new(AsciiEnglishDetector);

    let pipeline = Arc::new(PipelineEngine::new(
        adapters.clone(),
        executor,
        history,
        llm,
        moderator,
        reranker,
        language_detector,
        pools,
        PipelineStepsEnabled::default(),
    ));

    let auth = Arc::new(AuthMiddleware::new(
        config
            .api_keys
            .iter()
            .map(|k| {
                (
                    k.key.clone(),
                    orbit_core::ApiKeyBinding {
                        adapter_name: k.adapter_name.clone(),
                        active: k.active,
                    },
                )
            })
            .collect(),
        false,
    ));

    let rate_limiter = if config.security.rate_limiting.enabled && config.internal_services.redis.enabled {
        match RateLimiter::connect(&config.internal_services.redis.url).await {
            Ok(limiter) => Some(Arc::new(limiter)),
            Err(e) => {
                tracing::warn!(error = %e, "rate limiter: failed to connect to redis, running without rate limiting");
                None
            }
        }
    } else {
        None
    };

    let autocomplete = Arc::new(AutocompleteEngine::new(
        Arc::new(ConfigExampleSource {
            adapters: config.adapters.clone(),
        }),
        config.autocomplete.threshold as f64,
    ));

    Ok(AppState {
        config,
        pipeline,
        adapters,
        auth,
        rate_limiter,
        autocomplete,
        breakers,
        draining: Arc::new(std::sync::atomic::AtomicBool::new(false)),
    })
}

fn to_descriptor(cfg: &AdapterConfig) -> AdapterDescriptor {
    let adapter_type = match cfg.kind {
        ConfigAdapterType::Retriever => AdapterType::Retriever,
        ConfigAdapterType::Passthrough => AdapterType::Passthrough,
    };
    let retrieval_behavior = match cfg.capabilities.retrieval_behavior.as_str() {
        "vector" => RetrievalBehavior::Vector,
        "sql" => RetrievalBehavior::Sql,
        "intent_template" => RetrievalBehavior::IntentTemplate,
        "http" => RetrievalBehavior::Http,
        _ => RetrievalBehavior::Passthrough,
    };
    AdapterDescriptor {
        name: cfg.name.clone(),
        adapter_type,
        datasource: if cfg.datasource.is_empty() { None } else { Some(cfg.datasource.clone()) },
        implementation_ref: if cfg.implementation_ref.is_empty() {
            cfg.capabilities.retrieval_behavior.clone()
        } else {
            cfg.implementation_ref.clone()
        },
        capabilities: AdapterCapabilities {
            supports_autocomplete: cfg.capabilities.supports_autocomplete,
            supports_files: cfg.capabilities.supports_files,
            retrieval_behavior,
        },
        config: cfg.config.clone(),
    }
}

/// Registers one factory per retrieval-behavior kind. Adapters whose
/// `implementation_ref` names a specific backend (e.g. `sql`, `http`) fall
/// back to the shared in-memory vector store for `vector`/`intent_template`
/// so the gateway runs standalone without external datasources configured.
fn build_factories(shared_vector_store: Arc<InMemoryVectorStore>) -> HashMap<String, AdapterFactory> {
    let mut factories: HashMap<String, AdapterFactory> = HashMap::new();

    {
        let store = shared_vector_store.clone();
        factories.insert(
            "vector".to_string(),
            Arc::new(move |descriptor: &AdapterDescriptor| {
                let cfg = VectorRetrieverConfig {
                    adapter_name: descriptor.name.clone(),
                    namespace: vec![descriptor.name.clone()],
                    confidence_threshold: descriptor.config["confidence_threshold"].as_f64().unwrap_or(0.0),
                    return_results: descriptor.config["return_results"].as_u64().unwrap_or(5) as usize,
                    max_results: descriptor.config["max_results"].as_u64().unwrap_or(20) as usize,
                    similarity: SimilarityKind::Native,
                };
                Ok(Arc::new(VectorRetriever::new(store.clone(), cfg)) as Arc<dyn Retriever>)
            }),
        );
    }

    factories.insert(
        "passthrough".to_string(),
        Arc::new(move |descriptor: &AdapterDescriptor| {
            Ok(Arc::new(PassthroughRetriever::new(
                descriptor.name.clone(),
                shared_vector_store.clone(),
                descriptor.config["return_results"].as_u64().unwrap_or(5) as usize,
            )) as Arc<dyn Retriever>)
        }),
    );

    factories.insert(
        "http".to_string(),
        Arc::new(|descriptor: &AdapterDescriptor| {
            let url = descriptor.config["url"]
                .as_str()
                .ok_or_else(|| "http adapter config missing 'url'".to_string())?
                .to_string();
            let timeout_secs = descriptor.config["timeout_secs"].as_u64().unwrap_or(10);
            let max_retries = descriptor.config["max_retries"].as_u64().unwrap_or(2) as u32;
            let cfg = HttpRetrieverConfig {
                adapter_name: descriptor.name.clone(),
                url,
                auth: HttpAuth::None,
                timeout: Duration::from_secs(timeout_secs),
                max_retries,
            };
            HttpRetriever::new(cfg)
                .map(|r| Arc::new(r) as Arc<dyn Retriever>)
                .map_err(|e| e.to_string())
        }),
    );

    factories
}

/// Supplies autocomplete examples from each adapter descriptor's
/// `config.nl_examples` array.
struct ConfigExampleSource {
    adapters: Vec<AdapterConfig>,
}

impl ExampleSource for ConfigExampleSource {
    fn examples_for(&self, adapter_name: &str) -> Vec<String> {
        self.adapters
            .iter()
            .find(|a| a.name == adapter_name)
            .map(|a| {
                a.config["nl_examples"]
                    .as_array()
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}
