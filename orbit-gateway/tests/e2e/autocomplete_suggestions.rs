use super::common;

/// **Scenario**: a prefix close to one of the adapter's `nl_examples` entries
/// surfaces that example as a suggestion.
#[tokio::test]
async fn suggests_close_match_from_adapter_examples() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base_url}/v1/autocomplete"))
        .query(&[("adapter_name", "chat"), ("prefix", "what are your busine")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let suggestions = body["suggestions"].as_array().unwrap();
    assert!(
        suggestions.iter().any(|s| s["text"] == "what are your business hours"),
        "expected a business-hours suggestion, got {body:?}"
    );
}

/// **Scenario**: an empty prefix is a validation error.
#[tokio::test]
async fn empty_prefix_is_rejected() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base_url}/v1/autocomplete"))
        .query(&[("adapter_name", "chat"), ("prefix", "")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "validation_error");
}
