use super::common;

/// **Scenario**: `/v1/models` lists every configured adapter with its capabilities.
#[tokio::test]
async fn lists_configured_adapters() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;

    let resp = reqwest::get(format!("{base_url}/v1/models")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["name"], "chat");
    assert_eq!(models[0]["capabilities"]["supports_autocomplete"], true);
}

/// **Scenario**: when `models_endpoint_enabled` is false, the endpoint is disabled.
#[tokio::test]
async fn disabled_when_models_endpoint_is_off() {
    let yaml = common::MINIMAL_CONFIG.replace(
        "models_endpoint_enabled: true",
        "models_endpoint_enabled: false",
    );
    let (base_url, _dir) = common::spawn_gateway(&yaml).await;

    let resp = reqwest::get(format!("{base_url}/v1/models")).await.unwrap();
    assert_eq!(resp.status(), 400);
}
