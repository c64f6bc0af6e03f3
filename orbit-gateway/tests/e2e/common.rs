//! Shared helpers for e2e tests. Each test spawns its own gateway on a random
//! port with a throwaway YAML config, so tests never collide on ports or state.

use std::path::PathBuf;

use tokio::net::TcpListener;

pub const MINIMAL_CONFIG: &str = r#"
general:
  port: 0
  models_endpoint_enabled: true
api_keys:
  - key: test-key
    adapter_name: chat
internal_services:
  redis:
    enabled: false
security:
  rate_limiting:
    enabled: false
adapters:
  - name: chat
    type: passthrough
    implementation_ref: passthrough
    return_results: 3
    capabilities:
      supports_autocomplete: true
      retrieval_behavior: passthrough
    config:
      nl_examples:
        - "what is my account balance"
        - "what are your business hours"
"#;

/// Writes `yaml` to a temp file and spawns the gateway on 127.0.0.1:0.
/// Returns the base URL and the config tempdir (kept alive for the test's duration).
pub async fn spawn_gateway(yaml: &str) -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config_path: PathBuf = dir.path().join("orbit.yaml");
    std::fs::write(&config_path, yaml).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    tokio::spawn(async move {
        let _ = orbit_gateway::run_serve_on_listener(listener, &config_path).await;
    });

    (base_url, dir)
}
