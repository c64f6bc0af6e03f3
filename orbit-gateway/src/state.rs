//! Shared application state handed to every axum route.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use orbit_config::OrbitConfig;
use orbit_core::{AdapterManager, AuthMiddleware, AutocompleteEngine, BreakerRegistry, PipelineEngine, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<OrbitConfig>,
    pub pipeline: Arc<PipelineEngine>,
    pub adapters: Arc<AdapterManager>,
    pub auth: Arc<AuthMiddleware>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub autocomplete: Arc<AutocompleteEngine>,
    pub breakers: Arc<BreakerRegistry>,
    /// Set once graceful shutdown begins; `/health` reports it so a load
    /// balancer can stop routing new requests while in-flight ones finish.
    pub draining: Arc<AtomicBool>,
}
