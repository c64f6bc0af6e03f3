use super::common;

/// **Scenario**: `/health` is a static liveness probe.
#[tokio::test]
async fn health_reports_ok() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;

    let resp = reqwest::get(format!("{base_url}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

/// **Scenario**: `/health/adapters` reports one breaker snapshot per configured
/// adapter, and resetting a known adapter's breaker succeeds.
#[tokio::test]
async fn adapter_breaker_snapshot_and_reset() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base_url}/health/adapters/chat/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{base_url}/health/adapters"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["adapters"].as_array().unwrap().iter().any(|a| a["adapter_name"] == "chat"));
}

/// **Scenario**: resetting an adapter that doesn't exist is a 400.
#[tokio::test]
async fn reset_of_unknown_adapter_is_rejected() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base_url}/health/adapters/does-not-exist/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "adapter_not_found");
}
