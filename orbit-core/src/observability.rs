//! Structured logging helpers so every call site emits consistent fields
//! instead of ad hoc strings. Every record carries `request_id`; raw query
//! text is only logged when `verbose` is set.

use crate::breaker::BreakerState;
use tracing::info;

/// Wraps a request in a `tracing` span carrying `request_id`, so every log
/// record emitted while the guard is held inherits the field without each
/// call site threading it through manually.
pub fn request_span(request_id: &str) -> tracing::Span {
    tracing::info_span!("request", request_id = %request_id)
}

pub fn log_breaker_transition(adapter_name: &str, from: BreakerState, to: BreakerState) {
    info!(
        adapter = %adapter_name,
        from = ?from,
        to = ?to,
        "circuit breaker transition"
    );
}

pub fn log_pool_saturated(pool_name: &str, queued: usize, workers: usize) {
    info!(pool = %pool_name, queued, workers, "pool saturated");
}

pub fn log_retrieval_truncated(adapter_name: &str, result_count: usize, total_available: usize) {
    info!(
        adapter = %adapter_name,
        result_count,
        total_available,
        "retrieval truncated"
    );
}

pub fn log_moderation_verdict(stage: &str, flagged: bool, categories: &[String]) {
    info!(stage, flagged, categories = ?categories, "moderation verdict");
}

pub fn log_adapter_timing(adapter_name: &str, success: bool, elapsed_ms: u128) {
    info!(adapter = %adapter_name, success, elapsed_ms, "adapter call timing");
}

/// Redacts query text unless `verbose` is set, so raw user content never
/// lands in logs by default.
pub fn log_query(query: &str, verbose: bool) {
    if verbose {
        info!(query = %query, "query");
    } else {
        info!(query_len = query.len(), "query (redacted)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_do_not_panic() {
        log_breaker_transition("x", BreakerState::Closed, BreakerState::Open);
        log_pool_saturated("io", 10, 5);
        log_retrieval_truncated("x", 3, 10);
        log_moderation_verdict("pre", false, &[]);
        log_adapter_timing("x", true, 42);
        log_query("sensitive text", false);
        log_query("sensitive text", true);
    }

    #[test]
    fn request_span_carries_request_id_field() {
        let span = request_span("req-123");
        assert_eq!(span.metadata().unwrap().name(), "request");
    }
}
