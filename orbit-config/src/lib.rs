//! Load ORBIT's YAML configuration and project `.env`, then apply `.env` to the
//! process environment (existing env wins), substitute `${VAR}`/`${VAR:default}`
//! references throughout the YAML tree, and deserialize into [`OrbitConfig`].
//!
//! Precedence when a key is missing from the process environment: `.env` (current
//! directory, or `override_dir` if given) fills it in before substitution runs.

mod dotenv;
mod sections;
mod substitution;
pub mod summary;

use std::path::Path;
use thiserror::Error;

pub use sections::{
    AdapterCapabilities, AdapterConfig, AdapterType, ApiKeyConfig, AutocompleteConfig,
    BreakerOverride, DatasourceConfig, DatasourceKind, EmbeddingConfig, FaultToleranceConfig,
    GeneralConfig, InferenceConfig, InternalServicesConfig, LoggingConfig, ModeratorConfig,
    MongoConfig, OrbitConfig, PerformanceConfig, RateLimitingConfig, RedisConfig, RerankerConfig,
    SecurityConfig, ThreadPoolsConfig, WindowLimits,
};
pub use substitution::{substitute_str, substitute_value};
pub use summary::{build_config_summary, ConfigSection, RunConfigSummary};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Loads `.env` from `override_dir` (or the current directory) and applies it to
/// the process environment for keys not already set there.
pub fn apply_dotenv(override_dir: Option<&Path>) -> Result<(), LoadError> {
    let map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;
    for (key, value) in map {
        if std::env::var(&key).is_err() {
            std::env::set_var(&key, value);
        }
    }
    Ok(())
}

/// Loads the YAML config at `path`, applying `.env` precedence and `${VAR}`
/// substitution, then validates the result against the boundary behaviors
/// documented for ORBIT's configuration (e.g. `max_results = 0` is rejected).
pub fn load_config(path: &Path, override_dir: Option<&Path>) -> Result<OrbitConfig, LoadError> {
    apply_dotenv(override_dir)?;

    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut value: serde_yaml::Value = serde_yaml::from_str(&raw)?;
    substitution::substitute_value(&mut value);

    let config: OrbitConfig = serde_yaml::from_value(value)?;
    validate(&config)?;
    Ok(config)
}

/// Validates boundary behaviors that must fail at load time rather than at request
/// time: `max_results = 0` is invalid; `return_results > max_results`
/// is not an error here, it's clamped by the retriever at read time.
fn validate(config: &OrbitConfig) -> Result<(), LoadError> {
    for adapter in &config.adapters {
        if adapter.max_results == 0 {
            return Err(LoadError::Validation(format!(
                "adapter '{}': max_results must be > 0",
                adapter.name
            )));
        }
    }

    let mut seen = std::collections::HashSet::new();
    for adapter in &config.adapters {
        if !seen.insert(adapter.name.as_str()) {
            return Err(LoadError::Validation(format!(
                "duplicate adapter name: {}",
                adapter.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL_YAML: &str = r#"
general:
  host: "0.0.0.0"
  port: 8080
inference:
  provider: openai
  model: gpt-4o-mini
adapters:
  - name: qa-sql
    type: retriever
    datasource: main_db
    max_results: 20
    return_results: 3
"#;

    /// **Scenario**: a minimal YAML document loads with defaults filled in.
    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbit.yaml");
        fs::write(&path, MINIMAL_YAML).unwrap();

        let config = load_config(&path, Some(dir.path())).unwrap();
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.adapters.len(), 1);
        assert_eq!(config.performance.thread_pools.io, 50);
        assert_eq!(config.fault_tolerance.failure_threshold, 5);
    }

    /// **Scenario**: `${VAR}` substitution resolves against the process environment.
    #[test]
    fn substitutes_env_var_in_yaml() {
        std::env::set_var("ORBIT_TEST_REDIS_URL", "redis://test-host:6379");
        let yaml = r#"
general:
  port: 8080
inference:
  provider: openai
internal_services:
  redis:
    url: "${ORBIT_TEST_REDIS_URL}"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbit.yaml");
        fs::write(&path, yaml).unwrap();

        let config = load_config(&path, Some(dir.path())).unwrap();
        assert_eq!(config.internal_services.redis.url, "redis://test-host:6379");
        std::env::remove_var("ORBIT_TEST_REDIS_URL");
    }

    /// **Scenario**: `${VAR:default}` falls back when the env var is unset.
    #[test]
    fn substitutes_default_when_env_var_unset() {
        std::env::remove_var("ORBIT_TEST_UNSET_PORT");
        let yaml = r#"
general:
  port: 8080
inference:
  provider: "${ORBIT_TEST_UNSET_PORT:openai}"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbit.yaml");
        fs::write(&path, yaml).unwrap();

        let config = load_config(&path, Some(dir.path())).unwrap();
        assert_eq!(config.inference.provider, "openai");
    }

    /// `max_results = 0` is rejected at load time.
    #[test]
    fn rejects_zero_max_results() {
        let yaml = r#"
general:
  port: 8080
inference:
  provider: openai
adapters:
  - name: bad
    type: retriever
    max_results: 0
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbit.yaml");
        fs::write(&path, yaml).unwrap();

        let result = load_config(&path, Some(dir.path()));
        assert!(matches!(result, Err(LoadError::Validation(_))));
    }

    /// Duplicate adapter names are a fatal load error.
    #[test]
    fn rejects_duplicate_adapter_names() {
        let yaml = r#"
general:
  port: 8080
inference:
  provider: openai
adapters:
  - name: dup
    type: retriever
    max_results: 10
  - name: dup
    type: retriever
    max_results: 10
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbit.yaml");
        fs::write(&path, yaml).unwrap();

        let result = load_config(&path, Some(dir.path()));
        assert!(matches!(result, Err(LoadError::Validation(_))));
    }

    /// **Scenario**: an existing process env var wins over `.env`.
    #[test]
    fn existing_env_wins_over_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "ORBIT_TEST_PRECEDENCE=from_dotenv\n").unwrap();
        std::env::set_var("ORBIT_TEST_PRECEDENCE", "from_process_env");

        apply_dotenv(Some(dir.path())).unwrap();
        assert_eq!(
            std::env::var("ORBIT_TEST_PRECEDENCE").as_deref(),
            Ok("from_process_env")
        );
        std::env::remove_var("ORBIT_TEST_PRECEDENCE");
    }

    /// **Scenario**: missing config file surfaces a `Read` error, not a panic.
    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.yaml");
        let result = load_config(&path, Some(dir.path()));
        assert!(matches!(result, Err(LoadError::Read { .. })));
    }
}
