//! Named, bounded concurrency pools partitioned by workload class so that a
//! burst of I/O-bound adapter calls can't starve inference or embedding work.
//!
//! Each pool is a [`tokio::sync::Semaphore`] permit gate plus an active/queued
//! counter pair; `submit` acquires a permit, runs the future, and releases it
//! on completion (including panics, which are caught so one task can't bring
//! down its pool).

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool not found: {0}")]
    PoolNotFound(String),
    #[error("pool '{0}' saturated")]
    PoolSaturated(String),
    #[error("task in pool '{0}' panicked")]
    TaskPanicked(String),
}

/// Per-pool utilization snapshot returned by [`PoolManager::stats`].
#[derive(Clone, Debug, serde::Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub active: usize,
    pub queued: usize,
}

struct Pool {
    name: String,
    workers: usize,
    semaphore: Arc<Semaphore>,
    active: AtomicUsize,
    queued: AtomicUsize,
    task_seq: AtomicU64,
    verbose: bool,
}

impl Pool {
    fn new(name: impl Into<String>, workers: usize, verbose: bool) -> Self {
        Self {
            name: name.into(),
            workers,
            semaphore: Arc::new(Semaphore::new(workers)),
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            task_seq: AtomicU64::new(0),
            verbose,
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers,
            active: self.active.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
        }
    }
}

/// Recognized pool names and their default worker counts.
pub const DEFAULT_POOLS: [(&str, usize); 5] = [
    ("io", 50),
    ("cpu", 30),
    ("inference", 20),
    ("embedding", 15),
    ("db", 25),
];

/// Owns all named pools for the process. Cheap to clone (`Arc` inside).
#[derive(Clone)]
pub struct PoolManager {
    inner: Arc<PoolManagerInner>,
}

struct PoolManagerInner {
    pools: HashMap<String, Pool>,
}

impl PoolManager {
    pub fn new(sizes: impl IntoIterator<Item = (String, usize)>) -> Self {
        Self::with_verbosity(sizes, false)
    }

    pub fn with_verbosity(sizes: impl IntoIterator<Item = (String, usize)>, verbose: bool) -> Self {
        let pools = sizes
            .into_iter()
            .map(|(name, workers)| {
                let pool = Pool::new(name.clone(), workers, verbose);
                (name, pool)
            })
            .collect();
        Self {
            inner: Arc::new(PoolManagerInner { pools }),
        }
    }

    /// Builds a manager with the recognized pools and their default sizes.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_POOLS.iter().map(|(n, s)| (n.to_string(), *s)))
    }

    /// Runs `fut` under `pool_name`'s concurrency limit. Backpressure is applied
    /// by awaiting a permit rather than rejecting; callers that need fail-fast
    /// behavior should pair this with their own queue-depth check against
    /// [`Self::stats`] before calling `run_in_pool`.
    pub async fn run_in_pool<F, T>(&self, pool_name: &str, fut: F) -> Result<T, PoolError>
    where
        F: Future<Output = T>,
    {
        let pool = self
            .inner
            .pools
            .get(pool_name)
            .ok_or_else(|| PoolError::PoolNotFound(pool_name.to_string()))?;

        pool.queued.fetch_add(1, Ordering::Relaxed);
        let permit = pool
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore never closed");
        pool.queued.fetch_sub(1, Ordering::Relaxed);

        let seq = pool.task_seq.fetch_add(1, Ordering::Relaxed);
        pool.active.fetch_add(1, Ordering::Relaxed);
        if pool.verbose {
            info!(pool = %pool.name, task_seq = seq, stats = ?pool.stats(), "pool: submit");
        }

        let result = AssertUnwindSafe(fut).catch_unwind().await;

        pool.active.fetch_sub(1, Ordering::Relaxed);
        drop(permit);

        match result {
            Ok(value) => {
                if pool.verbose {
                    info!(pool = %pool.name, task_seq = seq, stats = ?pool.stats(), "pool: complete");
                }
                Ok(value)
            }
            Err(_) => {
                warn!(pool = %pool.name, task_seq = seq, "pool: task panicked");
                Err(PoolError::TaskPanicked(pool.name.clone()))
            }
        }
    }

    /// Rejects with [`PoolError::PoolSaturated`] instead of queuing when the
    /// pool's queued-task count already exceeds `max_queue_depth`. Used by
    /// callers that want fail-fast backpressure rather than the cooperative
    /// queuing of [`Self::run_in_pool`].
    pub async fn submit_or_reject<F, T>(
        &self,
        pool_name: &str,
        max_queue_depth: usize,
        fut: F,
    ) -> Result<T, PoolError>
    where
        F: Future<Output = T>,
    {
        let pool = self
            .inner
            .pools
            .get(pool_name)
            .ok_or_else(|| PoolError::PoolNotFound(pool_name.to_string()))?;

        if pool.queued.load(Ordering::Relaxed) >= max_queue_depth {
            return Err(PoolError::PoolSaturated(pool_name.to_string()));
        }

        self.run_in_pool(pool_name, fut).await
    }

    /// Scoped helper bounding in-flight tasks within a caller's own batch, on
    /// top of the pool's global limit.
    pub fn batch_executor(&self, pool_name: &str, max_concurrent: usize) -> BatchExecutor<'_> {
        BatchExecutor {
            manager: self,
            pool_name: pool_name.to_string(),
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn stats(&self) -> HashMap<String, PoolStats> {
        self.inner
            .pools
            .iter()
            .map(|(name, pool)| (name.clone(), pool.stats()))
            .collect()
    }

    /// Waits up to `timeout` for all pools to drain their active tasks. Does
    /// not accept new submissions during or after the wait; callers are
    /// expected to stop routing work to the manager before calling this.
    pub async fn shutdown(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let all_idle = self
                .inner
                .pools
                .values()
                .all(|p| p.active.load(Ordering::Relaxed) == 0);
            if all_idle || tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Caps concurrent tasks within one batch, independent of the pool's own
/// worker count.
pub struct BatchExecutor<'a> {
    manager: &'a PoolManager,
    pool_name: String,
    limiter: Arc<Semaphore>,
}

impl BatchExecutor<'_> {
    pub async fn run<F, T>(&self, fut: F) -> Result<T, PoolError>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .limiter
            .acquire()
            .await
            .expect("semaphore never closed");
        self.manager.run_in_pool(&self.pool_name, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_pool_errors() {
        let mgr = PoolManager::with_defaults();
        let err = mgr.run_in_pool("nope", async { 1 }).await.unwrap_err();
        assert!(matches!(err, PoolError::PoolNotFound(_)));
    }

    #[tokio::test]
    async fn runs_task_and_reports_stats() {
        let mgr = PoolManager::new([("io".to_string(), 2)]);
        let result = mgr.run_in_pool("io", async { 1 + 1 }).await.unwrap();
        assert_eq!(result, 2);
        let stats = mgr.stats();
        assert_eq!(stats["io"].active, 0);
        assert_eq!(stats["io"].workers, 2);
    }

    #[tokio::test]
    async fn caught_panic_becomes_task_panicked_error() {
        let mgr = PoolManager::new([("cpu".to_string(), 1)]);
        let err = mgr
            .run_in_pool("cpu", async { panic!("boom") })
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::TaskPanicked(_)));
    }

    #[tokio::test]
    async fn submit_or_reject_rejects_when_queue_full() {
        let mgr = PoolManager::new([("io".to_string(), 1)]);
        let err = mgr
            .submit_or_reject("io", 0, async { 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::PoolSaturated(_)));
    }

    #[tokio::test]
    async fn batch_executor_bounds_concurrency() {
        let mgr = PoolManager::new([("db".to_string(), 10)]);
        let batch = mgr.batch_executor("db", 2);
        let r1 = batch.run(async { 1 }).await.unwrap();
        let r2 = batch.run(async { 2 }).await.unwrap();
        assert_eq!(r1 + r2, 3);
    }

    #[tokio::test]
    async fn default_pools_have_expected_worker_counts() {
        let mgr = PoolManager::with_defaults();
        let stats = mgr.stats();
        assert_eq!(stats["io"].workers, 50);
        assert_eq!(stats["cpu"].workers, 30);
        assert_eq!(stats["inference"].workers, 20);
        assert_eq!(stats["embedding"].workers, 15);
        assert_eq!(stats["db"].workers, 25);
    }
}
