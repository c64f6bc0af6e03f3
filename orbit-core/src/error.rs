//! Top-level error taxonomy, tagged with `request_id` where one exists
//! and mapped onto an HTTP status by [`OrbitError::status_code`].
//!
//! Module-local errors (`CacheError`, `StoreError`, ...) stay module-local; this
//! enum is what crosses the pipeline/executor/gateway boundaries, so no adapter or
//! step exception is allowed to unwind past its owning module.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrbitError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("missing session id")]
    MissingSession,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("adapter '{adapter}' failed: {detail}")]
    AdapterFailure { adapter: String, detail: String },

    #[error("timeout in {scope}")]
    Timeout { scope: String },

    #[error("circuit open for adapter '{0}'")]
    CircuitOpen(String),

    #[error("pool '{0}' saturated")]
    PoolSaturated(String),

    #[error("moderation flagged content unsafe ({stage})")]
    ModerationUnsafe { stage: ModerationStage },

    #[error("upstream provider error ({provider}): {detail}")]
    UpstreamProviderError { provider: String, detail: String },

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationStage {
    Pre,
    Post,
}

impl std::fmt::Display for ModerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationStage::Pre => write!(f, "pre"),
            ModerationStage::Post => write!(f, "post"),
        }
    }
}

impl OrbitError {
    /// HTTP status code this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            OrbitError::Validation(_) => 400,
            OrbitError::Auth(_) => 401,
            OrbitError::MissingSession => 400,
            OrbitError::RateLimited { .. } => 429,
            OrbitError::AdapterNotFound(_) => 400,
            OrbitError::AdapterFailure { .. } => 200,
            OrbitError::Timeout { .. } => 504,
            OrbitError::CircuitOpen(_) => 200,
            OrbitError::PoolSaturated(_) => 503,
            OrbitError::ModerationUnsafe { .. } => 200,
            OrbitError::UpstreamProviderError { .. } => 502,
            OrbitError::Internal(_) => 500,
        }
    }

    /// Machine-readable error code for the `{error:{code,message}}` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            OrbitError::Validation(_) => "validation_error",
            OrbitError::Auth(_) => "auth_error",
            OrbitError::MissingSession => "missing_session",
            OrbitError::RateLimited { .. } => "rate_limited",
            OrbitError::AdapterNotFound(_) => "adapter_not_found",
            OrbitError::AdapterFailure { .. } => "adapter_failure",
            OrbitError::Timeout { .. } => "timeout",
            OrbitError::CircuitOpen(_) => "circuit_open",
            OrbitError::PoolSaturated(_) => "pool_saturated",
            OrbitError::ModerationUnsafe { .. } => "moderation_unsafe",
            OrbitError::UpstreamProviderError { .. } => "upstream_provider_error",
            OrbitError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_429() {
        let err = OrbitError::RateLimited { retry_after_secs: 60 };
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.code(), "rate_limited");
    }

    #[test]
    fn circuit_open_is_a_200_with_synthetic_result() {
        let err = OrbitError::CircuitOpen("flaky".to_string());
        assert_eq!(err.status_code(), 200);
    }

    #[test]
    fn pool_saturated_is_503() {
        assert_eq!(OrbitError::PoolSaturated("io".into()).status_code(), 503);
    }
}
