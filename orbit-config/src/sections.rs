//! Structured config sections matching the external configuration format
//! (`general`, `api_keys`, `logging`, `internal_services.*`, `datasources`,
//! `embeddings`, `inference`, `rerankers`, `moderators`, `adapters`,
//! `fault_tolerance`, `autocomplete`, `performance.thread_pools`,
//! `security.rate_limiting.*`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrbitConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub internal_services: InternalServicesConfig,
    #[serde(default)]
    pub datasources: HashMap<String, DatasourceConfig>,
    #[serde(default)]
    pub embeddings: HashMap<String, EmbeddingConfig>,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub rerankers: HashMap<String, RerankerConfig>,
    #[serde(default)]
    pub moderators: HashMap<String, ModeratorConfig>,
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
    #[serde(default)]
    pub fault_tolerance: FaultToleranceConfig,
    #[serde(default)]
    pub autocomplete: AutocompleteConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_true")]
    pub models_endpoint_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verbose: false,
            models_endpoint_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyConfig {
    pub key: String,
    pub adapter_name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub log_raw_queries: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_raw_queries: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InternalServicesConfig {
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub mongodb: MongoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MongoConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DatasourceKind {
    Vector,
    Sql,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasourceConfig {
    pub kind: DatasourceKind,
    #[serde(default)]
    pub connection_string: String,
    /// Scaling factor `s` for L2-distance-to-similarity conversion (`1/(1 + d/s)`).
    #[serde(default = "default_distance_scale")]
    pub distance_scale: f32,
    #[serde(default)]
    pub approved_by_admin: bool,
}

fn default_distance_scale() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

fn default_embedding_dimension() -> usize {
    1536
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_provider")]
    pub provider: String,
    #[serde(default = "default_inference_model")]
    pub model: String,
    #[serde(default = "default_context_window")]
    pub context_window_tokens: usize,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_inference_provider() -> String {
    "openai".to_string()
}

fn default_inference_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_context_window() -> usize {
    8192
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: default_inference_provider(),
            model: default_inference_model(),
            context_window_tokens: default_context_window(),
            api_key: String::new(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankerConfig {
    pub provider: String,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModeratorConfig {
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_refusal")]
    pub refusal_message: String,
}

fn default_refusal() -> String {
    "I can't help with that request.".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    Retriever,
    Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterCapabilities {
    #[serde(default)]
    pub supports_autocomplete: bool,
    #[serde(default)]
    pub supports_files: bool,
    #[serde(default = "default_retrieval_behavior")]
    pub retrieval_behavior: String,
}

fn default_retrieval_behavior() -> String {
    "always".to_string()
}

impl Default for AdapterCapabilities {
    fn default() -> Self {
        Self {
            supports_autocomplete: false,
            supports_files: false,
            retrieval_behavior: default_retrieval_behavior(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AdapterType,
    #[serde(default)]
    pub datasource: String,
    #[serde(default)]
    pub implementation_ref: String,
    #[serde(default)]
    pub capabilities: AdapterCapabilities,
    #[serde(default = "default_return_results")]
    pub return_results: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_return_results() -> usize {
    5
}

fn default_max_results() -> usize {
    20
}

fn default_confidence_threshold() -> f32 {
    0.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultToleranceConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_adapters")]
    pub max_concurrent_adapters: usize,
    #[serde(default, rename = "per_adapter")]
    pub per_adapter_overrides: HashMap<String, BreakerOverride>,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_success_threshold() -> u32 {
    3
}
fn default_recovery_timeout_secs() -> u64 {
    60
}
fn default_op_timeout_secs() -> u64 {
    30
}
fn default_max_concurrent_adapters() -> usize {
    8
}

impl Default for FaultToleranceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            op_timeout_secs: default_op_timeout_secs(),
            max_concurrent_adapters: default_max_concurrent_adapters(),
            per_adapter_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BreakerOverride {
    pub failure_threshold: Option<u32>,
    pub success_threshold: Option<u32>,
    pub recovery_timeout_secs: Option<u64>,
    pub op_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutocompleteConfig {
    #[serde(default = "default_autocomplete_limit")]
    pub default_limit: usize,
    #[serde(default = "default_autocomplete_threshold")]
    pub threshold: f32,
    #[serde(default = "default_autocomplete_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_match_mode")]
    pub match_mode: String,
}

fn default_autocomplete_limit() -> usize {
    10
}
fn default_autocomplete_threshold() -> f32 {
    40.0
}
fn default_autocomplete_ttl_secs() -> u64 {
    1800
}
fn default_match_mode() -> String {
    "jaro_winkler".to_string()
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            default_limit: default_autocomplete_limit(),
            threshold: default_autocomplete_threshold(),
            cache_ttl_secs: default_autocomplete_ttl_secs(),
            match_mode: default_match_mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PerformanceConfig {
    #[serde(default)]
    pub thread_pools: ThreadPoolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadPoolsConfig {
    #[serde(default = "default_io_pool")]
    pub io: usize,
    #[serde(default = "default_cpu_pool")]
    pub cpu: usize,
    #[serde(default = "default_inference_pool")]
    pub inference: usize,
    #[serde(default = "default_embedding_pool")]
    pub embedding: usize,
    #[serde(default = "default_db_pool")]
    pub db: usize,
}

fn default_io_pool() -> usize {
    50
}
fn default_cpu_pool() -> usize {
    30
}
fn default_inference_pool() -> usize {
    20
}
fn default_embedding_pool() -> usize {
    15
}
fn default_db_pool() -> usize {
    25
}

impl Default for ThreadPoolsConfig {
    fn default() -> Self {
        Self {
            io: default_io_pool(),
            cpu: default_cpu_pool(),
            inference: default_inference_pool(),
            embedding: default_embedding_pool(),
            db: default_db_pool(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub ip_limits: WindowLimits,
    #[serde(default)]
    pub api_key_limits: WindowLimits,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ip_limits: WindowLimits::default(),
            api_key_limits: WindowLimits::default(),
            exclude_paths: vec!["/health".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowLimits {
    #[serde(default = "default_minute_limit")]
    pub per_minute: u32,
    #[serde(default = "default_hour_limit")]
    pub per_hour: u32,
}

fn default_minute_limit() -> u32 {
    60
}
fn default_hour_limit() -> u32 {
    1000
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self {
            per_minute: default_minute_limit(),
            per_hour: default_hour_limit(),
        }
    }
}
