//! Per-adapter Closed/Open/HalfOpen circuit breaker state machine. One
//! [`CircuitBreaker`] instance lives per adapter name for the process
//! lifetime; `record_success`/`record_failure` are its only mutators,
//! serialized by an internal mutex so transitions are linearizable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone, Debug)]
pub struct BreakerPolicy {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
    pub op_timeout: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            op_timeout: Duration::from_secs(30),
        }
    }
}

struct Inner {
    state: BreakerState,
    consec_failures: u32,
    consec_successes: u32,
    state_entered_ts: SystemTime,
    last_failure_ts: Option<SystemTime>,
}

/// Per-adapter breaker. `total_calls` and `timeout_calls` are plain atomics
/// since they're monotonic counters read without needing the state lock.
pub struct CircuitBreaker {
    pub adapter_name: String,
    pub policy: BreakerPolicy,
    inner: Mutex<Inner>,
    total_calls: AtomicU64,
    timeout_calls: AtomicU64,
}

/// A point-in-time snapshot for `/health/adapters` and tests.
#[derive(Clone, Debug, serde::Serialize)]
pub struct CircuitBreakerState {
    pub adapter_name: String,
    pub state: BreakerState,
    pub consec_failures: u32,
    pub consec_successes: u32,
    pub total_calls: u64,
    pub timeout_calls: u64,
}

impl CircuitBreaker {
    pub fn new(adapter_name: impl Into<String>, policy: BreakerPolicy) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            policy,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consec_failures: 0,
                consec_successes: 0,
                state_entered_ts: SystemTime::now(),
                last_failure_ts: None,
            }),
            total_calls: AtomicU64::new(0),
            timeout_calls: AtomicU64::new(0),
        }
    }

    /// True if calls should be short-circuited. Has an atomic side effect: if
    /// the breaker is Open and `recovery_timeout` has elapsed, it transitions
    /// to HalfOpen and returns `false`, permitting exactly one trial call.
    pub fn is_open(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        if inner.state == BreakerState::Open {
            let elapsed = inner
                .state_entered_ts
                .elapsed()
                .unwrap_or(Duration::ZERO);
            if elapsed >= self.policy.recovery_timeout {
                inner.state = BreakerState::HalfOpen;
                inner.state_entered_ts = SystemTime::now();
                inner.consec_successes = 0;
                return false;
            }
            return true;
        }
        false
    }

    pub fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.consec_failures = 0;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.consec_successes += 1;
                if inner.consec_successes >= self.policy.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.state_entered_ts = SystemTime::now();
                    inner.consec_successes = 0;
                }
            }
            BreakerState::Closed | BreakerState::Open => {
                inner.consec_successes += 1;
            }
        }
    }

    /// Records a failure. `is_timeout` only affects the separate
    /// `timeout_calls` counter; both exceptions and timeouts count the same
    /// way toward `consec_failures`.
    pub fn record_failure(&self, is_timeout: bool) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if is_timeout {
            self.timeout_calls.fetch_add(1, Ordering::Relaxed);
        }
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.consec_successes = 0;
        inner.consec_failures += 1;
        inner.last_failure_ts = Some(SystemTime::now());

        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.state_entered_ts = SystemTime::now();
            }
            BreakerState::Closed => {
                if inner.consec_failures >= self.policy.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.state_entered_ts = SystemTime::now();
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Explicit admin reset back to Closed, clearing counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.state = BreakerState::Closed;
        inner.consec_failures = 0;
        inner.consec_successes = 0;
        inner.state_entered_ts = SystemTime::now();
        inner.last_failure_ts = None;
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        let inner = self.inner.lock().expect("breaker mutex poisoned");
        CircuitBreakerState {
            adapter_name: self.adapter_name.clone(),
            state: inner.state,
            consec_failures: inner.consec_failures,
            consec_successes: inner.consec_successes,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            timeout_calls: self.timeout_calls.load(Ordering::Relaxed),
        }
    }

    /// Forces the breaker straight to Open, bypassing `failure_threshold`.
    /// Used when an adapter's construction fails outright: the circuit for
    /// that adapter is opened immediately rather than waiting for
    /// `failure_threshold` live call failures to accumulate.
    pub fn force_open(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.state = BreakerState::Open;
        inner.state_entered_ts = SystemTime::now();
        inner.consec_failures = self.policy.failure_threshold;
    }
}

/// Registry of breakers keyed by adapter name, created lazily on first call
/// (mirrors the lazy-instantiation rule in the adapter registry).
pub struct BreakerRegistry {
    breakers: dashmap::DashMap<String, std::sync::Arc<CircuitBreaker>>,
    default_policy: BreakerPolicy,
}

impl BreakerRegistry {
    pub fn new(default_policy: BreakerPolicy) -> Self {
        Self {
            breakers: dashmap::DashMap::new(),
            default_policy,
        }
    }

    pub fn get_or_create(&self, adapter_name: &str) -> std::sync::Arc<CircuitBreaker> {
        self.breakers
            .entry(adapter_name.to_string())
            .or_insert_with(|| {
                std::sync::Arc::new(CircuitBreaker::new(
                    adapter_name.to_string(),
                    self.default_policy.clone(),
                ))
            })
            .clone()
    }

    /// Registers a per-adapter policy override. Must be called before the
    /// breaker's first use.
    pub fn get_or_create_with_policy(
        &self,
        adapter_name: &str,
        policy: BreakerPolicy,
    ) -> std::sync::Arc<CircuitBreaker> {
        self.breakers
            .entry(adapter_name.to_string())
            .or_insert_with(|| std::sync::Arc::new(CircuitBreaker::new(adapter_name.to_string(), policy)))
            .clone()
    }

    pub fn snapshot_all(&self) -> Vec<CircuitBreakerState> {
        self.breakers.iter().map(|e| e.value().snapshot()).collect()
    }
}

#[allow(dead_code)]
fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: 3,
            success_threshold: 2,
            recovery_timeout: Duration::from_millis(20),
            op_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = CircuitBreaker::new("flaky", fast_policy());
        assert!(!cb.is_open());
        cb.record_failure(false);
        cb.record_failure(false);
        assert!(!cb.is_open());
        cb.record_failure(false);
        assert!(cb.is_open());
        assert_eq!(cb.snapshot().state, BreakerState::Open);
    }

    #[test]
    fn success_resets_consec_failures_without_closing_from_closed() {
        let cb = CircuitBreaker::new("a", fast_policy());
        cb.record_failure(false);
        cb.record_failure(false);
        cb.record_success();
        cb.record_failure(false);
        cb.record_failure(false);
        assert!(!cb.is_open());
    }

    #[tokio::test]
    async fn half_open_after_recovery_then_closes_on_successes() {
        let cb = CircuitBreaker::new("flaky", fast_policy());
        cb.record_failure(false);
        cb.record_failure(false);
        cb.record_failure(false);
        assert!(cb.is_open());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cb.is_open(), "should allow one trial after recovery_timeout");
        assert_eq!(cb.snapshot().state, BreakerState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.snapshot().state, BreakerState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.snapshot().state, BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new("flaky", fast_policy());
        cb.record_failure(false);
        cb.record_failure(false);
        cb.record_failure(false);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cb.is_open());
        cb.record_failure(false);
        assert_eq!(cb.snapshot().state, BreakerState::Open);
    }

    #[test]
    fn timeout_counts_as_failure_and_increments_timeout_calls() {
        let cb = CircuitBreaker::new("a", fast_policy());
        cb.record_failure(true);
        let snap = cb.snapshot();
        assert_eq!(snap.consec_failures, 1);
        assert_eq!(snap.timeout_calls, 1);
    }

    #[test]
    fn registry_creates_lazily_and_is_stable() {
        let registry = BreakerRegistry::new(BreakerPolicy::default());
        let a = registry.get_or_create("x");
        let b = registry.get_or_create("x");
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn admin_reset_clears_open_state() {
        let cb = CircuitBreaker::new("flaky", fast_policy());
        cb.record_failure(false);
        cb.record_failure(false);
        cb.record_failure(false);
        assert!(cb.is_open());
        cb.reset();
        assert!(!cb.is_open());
        assert_eq!(cb.snapshot().state, BreakerState::Closed);
    }

    #[test]
    fn force_open_bypasses_failure_threshold() {
        let cb = CircuitBreaker::new("a", BreakerPolicy::default());
        assert!(!cb.is_open());
        cb.force_open();
        assert!(cb.is_open());
    }
}
