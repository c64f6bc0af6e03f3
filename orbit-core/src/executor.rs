//! Runs N adapters concurrently under their circuit breakers, honoring an
//! execution strategy, a total timeout budget, and context propagation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::adapter::{AdapterManager, RetrievalBehavior};
use crate::breaker::BreakerRegistry;
use crate::pool::PoolManager;
use crate::retriever::{ContextDocument, RetrievalMeta, RetrievalQuery};

/// Picks the worker pool an adapter's retrieval call runs under: embedding
/// generation goes to `embedding`, SQL execution to `db`, everything else
/// (HTTP calls, passthrough lookups) to `io`.
fn pool_for(behavior: RetrievalBehavior) -> &'static str {
    match behavior {
        RetrievalBehavior::Vector | RetrievalBehavior::IntentTemplate => "embedding",
        RetrievalBehavior::Sql => "db",
        RetrievalBehavior::Http | RetrievalBehavior::Passthrough => "io",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStrategy {
    All,
    FirstSuccess,
    BestEffort,
}

/// Context fields echoed back to each adapter invocation and mirrored onto
/// its result for downstream logging.
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    pub request_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub trace_id: Option<String>,
    pub correlation_id: Option<String>,
    pub file_ids: Vec<String>,
    pub api_key_fingerprint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AdapterResult {
    pub adapter_name: String,
    pub success: bool,
    pub data: Vec<ContextDocument>,
    pub meta: RetrievalMeta,
    pub execution_time: Duration,
    pub error: Option<String>,
    pub context_echo: ExecutionContext,
}

pub struct ExecutorConfig {
    pub max_concurrent_adapters: usize,
    pub total_timeout: Duration,
    /// Fraction of an adapter's timeout budget spent on "initialization"
    /// before the execution-timeout clock starts.
    pub init_fraction: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_adapters: 8,
            total_timeout: Duration::from_secs(10),
            init_fraction: 0.3,
        }
    }
}

pub struct ParallelAdapterExecutor {
    adapters: Arc<AdapterManager>,
    breakers: Arc<BreakerRegistry>,
    pools: Arc<PoolManager>,
    config: ExecutorConfig,
}

impl ParallelAdapterExecutor {
    pub fn new(
        adapters: Arc<AdapterManager>,
        breakers: Arc<BreakerRegistry>,
        pools: Arc<PoolManager>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            adapters,
            breakers,
            pools,
            config,
        }
    }

    /// Runs `adapter_names` under `strategy`, preserving request order in the
    /// output regardless of completion order.
    pub async fn execute(
        &self,
        query: &RetrievalQuery,
        adapter_names: &[String],
        ctx: &ExecutionContext,
        strategy: ExecutionStrategy,
    ) -> Vec<AdapterResult> {
        if adapter_names.is_empty() {
            return vec![];
        }

        let limiter = Arc::new(Semaphore::new(self.config.max_concurrent_adapters.max(1)));
        let mut slots: Vec<Option<AdapterResult>> = vec![None; adapter_names.len()];

        // Step 1: short-circuit adapters whose breaker is open without
        // invoking them, and collect the rest to actually run.
        let mut to_run = Vec::new();
        for (idx, name) in adapter_names.iter().enumerate() {
            let breaker = self.breakers.get_or_create(name);
            if breaker.is_open() {
                slots[idx] = Some(AdapterResult {
                    adapter_name: name.clone(),
                    success: false,
                    data: vec![],
                    meta: RetrievalMeta::default(),
                    execution_time: Duration::ZERO,
                    error: Some("circuit_open".to_string()),
                    context_echo: ctx.clone(),
                });
            } else {
                to_run.push(idx);
            }
        }

        let mut join_set: JoinSet<(usize, Result<AdapterResult, ()>)> = JoinSet::new();
        for idx in to_run {
            let name = adapter_names[idx].clone();
            let adapters = self.adapters.clone();
            let breakers = self.breakers.clone();
            let pools = self.pools.clone();
            let limiter = limiter.clone();
            let ctx = ctx.clone();
            let query = query.clone();
            let init_fraction = self.config.init_fraction;

            join_set.spawn(async move {
                let _permit = limiter.acquire_owned().await.expect("semaphore never closed");
                let result = run_one(&adapters, &breakers, &pools, &name, &query, &ctx, init_fraction).await;
                (idx, Ok(result))
            });
        }

        match strategy {
            ExecutionStrategy::All => {
                let deadline = tokio::time::Instant::now() + self.config.total_timeout;
                loop {
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    match tokio::time::timeout(remaining, join_set.join_next()).await {
                        Ok(Some(Ok((idx, Ok(result))))) => slots[idx] = Some(result),
                        Ok(Some(_)) | Ok(None) => {
                            if join_set.is_empty() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                join_set.shutdown().await;
                for (idx, slot) in slots.iter_mut().enumerate() {
                    if slot.is_none() {
                        slot.replace(timeout_result(&adapter_names[idx], ctx));
                    }
                }
            }
            ExecutionStrategy::FirstSuccess => {
                let deadline = tokio::time::Instant::now() + self.config.total_timeout;
                let mut winner_idx = None;
                loop {
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    if remaining.is_zero() || join_set.is_empty() {
                        break;
                    }
                    match tokio::time::timeout(remaining, join_set.join_next()).await {
                        Ok(Some(Ok((idx, Ok(result))))) => {
                            let success = result.success;
                            slots[idx] = Some(result);
                            if success {
                                winner_idx = Some(idx);
                                break;
                            }
                        }
                        _ => break,
                    }
                }
                // Cancel the rest; a dropped task records neither success nor
                // failure for the breaker.
                join_set.shutdown().await;
                for (idx, slot) in slots.iter_mut().enumerate() {
                    if slot.is_none() && Some(idx) != winner_idx {
                        slot.replace(cancelled_result(&adapter_names[idx], ctx));
                    }
                }
            }
            ExecutionStrategy::BestEffort => {
                let deadline = tokio::time::Instant::now() + self.config.total_timeout;
                loop {
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    if remaining.is_zero() || join_set.is_empty() {
                        break;
                    }
                    match tokio::time::timeout(remaining, join_set.join_next()).await {
                        Ok(Some(Ok((idx, Ok(result))))) => slots[idx] = Some(result),
                        _ => break,
                    }
                }
                join_set.shutdown().await;
                for (idx, slot) in slots.iter_mut().enumerate() {
                    if slot.is_none() {
                        slot.replace(cancelled_result(&adapter_names[idx], ctx));
                    }
                }
            }
        }

        slots.into_iter().map(|s| s.expect("every slot filled")).collect()
    }
}

async fn run_one(
    adapters: &Arc<AdapterManager>,
    breakers: &Arc<BreakerRegistry>,
    pools: &Arc<PoolManager>,
    name: &str,
    query: &RetrievalQuery,
    ctx: &ExecutionContext,
    init_fraction: f64,
) -> AdapterResult {
    let breaker = breakers.get_or_create(name);
    let started = Instant::now();

    let retriever = match adapters.get(name).await {
        Ok(r) => r,
        Err(e) => {
            breaker.record_failure(false);
            return AdapterResult {
                adapter_name: name.to_string(),
                success: false,
                data: vec![],
                meta: RetrievalMeta::default(),
                execution_time: started.elapsed(),
                error: Some(e.to_string()),
                context_echo: ctx.clone(),
            };
        }
    };

    // The breaker's op_timeout bounds this specific adapter's call, honoring
    // any per-adapter override registered at startup.
    let exec_timeout = breaker.policy.op_timeout.mul_f64((1.0 - init_fraction).max(0.0));
    let pool_name = adapters
        .descriptor(name)
        .map(|d| pool_for(d.capabilities.retrieval_behavior))
        .unwrap_or("io");

    let query = query.clone();
    let fut = pools.run_in_pool(pool_name, async move { retriever.get_relevant_context(&query).await });

    match tokio::time::timeout(exec_timeout, fut).await {
        Ok(Ok(Ok(outcome))) => {
            breaker.record_success();
            AdapterResult {
                adapter_name: name.to_string(),
                success: true,
                data: outcome.docs,
                meta: outcome.meta,
                execution_time: started.elapsed(),
                error: None,
                context_echo: ctx.clone(),
            }
        }
        Ok(Ok(Err(e))) => {
            breaker.record_failure(false);
            AdapterResult {
                adapter_name: name.to_string(),
                success: false,
                data: vec![],
                meta: RetrievalMeta::default(),
                execution_time: started.elapsed(),
                error: Some(e.to_string()),
                context_echo: ctx.clone(),
            }
        }
        Ok(Err(_)) => {
            breaker.record_failure(false);
            AdapterResult {
                adapter_name: name.to_string(),
                success: false,
                data: vec![],
                meta: RetrievalMeta::default(),
                execution_time: started.elapsed(),
                error: Some("pool task failed".to_string()),
                context_echo: ctx.clone(),
            }
        }
        Err(_) => {
            breaker.record_failure(true);
            AdapterResult {
                adapter_name: name.to_string(),
                success: false,
                data: vec![],
                meta: RetrievalMeta::default(),
                execution_time: started.elapsed(),
                error: Some("timeout".to_string()),
                context_echo: ctx.clone(),
            }
        }
    }
}

fn timeout_result(name: &str, ctx: &ExecutionContext) -> AdapterResult {
    AdapterResult {
        adapter_name: name.to_string(),
        success: false,
        data: vec![],
        meta: RetrievalMeta::default(),
        execution_time: Duration::ZERO,
        error: Some("timeout".to_string()),
        context_echo: ctx.clone(),
    }
}

fn cancelled_result(name: &str, ctx: &ExecutionContext) -> AdapterResult {
    AdapterResult {
        adapter_name: name.to_string(),
        success: false,
        data: vec![],
        meta: RetrievalMeta::default(),
        execution_time: Duration::ZERO,
        error: Some("cancelled".to_string()),
        context_echo: ctx.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterDescriptor, AdapterCapabilities, AdapterFactory, AdapterType, RetrievalBehavior};
    use crate::breaker::BreakerPolicy;
    use crate::retriever::{Retriever, RetrievalOutcome, RetrieverError};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedRetriever {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn get_relevant_context(
            &self,
            _query: &RetrievalQuery,
        ) -> Result<RetrievalOutcome, RetrieverError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(RetrieverError::Backend("boom".to_string()))
            } else {
                Ok(RetrievalOutcome {
                    docs: vec![],
                    meta: RetrievalMeta::default(),
                })
            }
        }
    }

    fn descriptor(name: &str) -> AdapterDescriptor {
        AdapterDescriptor {
            name: name.to_string(),
            adapter_type: AdapterType::Retriever,
            datasource: None,
            implementation_ref: name.to_string(),
            capabilities: AdapterCapabilities {
                supports_autocomplete: false,
                supports_files: false,
                retrieval_behavior: RetrievalBehavior::Passthrough,
            },
            config: serde_json::Value::Null,
        }
    }

    fn build_executor(
        names_and_retrievers: Vec<(&str, Duration, bool)>,
        strategy_timeout: Duration,
    ) -> ParallelAdapterExecutor {
        let mut descriptors = Vec::new();
        let mut factories: HashMap<String, AdapterFactory> = HashMap::new();
        for (name, delay, fail) in names_and_retrievers {
            descriptors.push(descriptor(name));
            factories.insert(
                name.to_string(),
                Arc::new(move |_d: &AdapterDescriptor| {
                    Ok(Arc::new(FixedRetriever { delay, fail }) as Arc<dyn Retriever>)
                }),
            );
        }
        let breakers = Arc::new(BreakerRegistry::new(BreakerPolicy::default()));
        let adapters = Arc::new(
            AdapterManager::new(descriptors, factories, HashMap::new(), breakers.clone()).unwrap(),
        );
        let pools = Arc::new(PoolManager::with_defaults());
        ParallelAdapterExecutor::new(
            adapters,
            breakers,
            pools,
            ExecutorConfig {
                max_concurrent_adapters: 8,
                total_timeout: strategy_timeout,
                init_fraction: 0.3,
            },
        )
    }

    #[tokio::test]
    async fn empty_adapter_list_returns_empty() {
        let executor = build_executor(vec![], Duration::from_secs(1));
        let results = executor
            .execute(&RetrievalQuery::default(), &[], &ExecutionContext::default(), ExecutionStrategy::All)
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn all_strategy_preserves_request_order() {
        let executor = build_executor(
            vec![("b", Duration::from_millis(5), false), ("a", Duration::from_millis(20), false)],
            Duration::from_secs(2),
        );
        let names = vec!["b".to_string(), "a".to_string()];
        let results = executor
            .execute(&RetrievalQuery::default(), &names, &ExecutionContext::default(), ExecutionStrategy::All)
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].adapter_name, "b");
        assert_eq!(results[1].adapter_name, "a");
        assert!(results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_without_invoking_adapter() {
        let executor = build_executor(vec![("flaky", Duration::from_millis(1), true)], Duration::from_secs(1));
        let breaker = executor.breakers.get_or_create("flaky");
        breaker.force_open();

        let names = vec!["flaky".to_string()];
        let results = executor
            .execute(&RetrievalQuery::default(), &names, &ExecutionContext::default(), ExecutionStrategy::All)
            .await;
        assert_eq!(results[0].error.as_deref(), Some("circuit_open"));
    }

    #[tokio::test]
    async fn first_success_cancels_the_rest() {
        let executor = build_executor(
            vec![
                ("fast", Duration::from_millis(5), false),
                ("slow", Duration::from_millis(200), false),
            ],
            Duration::from_secs(2),
        );
        let names = vec!["fast".to_string(), "slow".to_string()];
        let results = executor
            .execute(
                &RetrievalQuery::default(),
                &names,
                &ExecutionContext::default(),
                ExecutionStrategy::FirstSuccess,
            )
            .await;
        assert!(results[0].success);
        assert_eq!(results[1].error.as_deref(), Some("cancelled"));
    }
}
