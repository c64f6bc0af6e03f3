use super::common;

/// **Scenario**: a chat request with a valid API key flows through the full
/// pipeline (auth -> passthrough retrieval -> the mock LLM fallback) and comes
/// back as JSON with the fixed mock response, since no inference API key is
/// configured in the test fixture.
#[tokio::test]
async fn non_streaming_chat_returns_mock_llm_response() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base_url}/v1/chat"))
        .json(&serde_json::json!({
            "message": "what are your hours",
            "api_key": "test-key",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["request_id"].as_str().is_some());
    assert!(body["response"].as_str().unwrap().contains("not configured with an inference API key"));
}

/// **Scenario**: an unrecognized API key is rejected before the pipeline runs.
#[tokio::test]
async fn unknown_api_key_is_rejected() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base_url}/v1/chat"))
        .json(&serde_json::json!({
            "message": "hello",
            "api_key": "not-a-real-key",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "auth_error");
}

/// **Scenario**: `stream: true` returns an SSE body of `delta` chunks
/// terminated by `done` and the `[DONE]` line.
#[tokio::test]
async fn streaming_chat_emits_delta_done_and_terminator() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base_url}/v1/chat"))
        .json(&serde_json::json!({
            "message": "hi",
            "api_key": "test-key",
            "stream": true,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("\"type\":\"delta\""));
    assert!(body.contains("\"type\":\"done\""));
    assert!(body.trim_end().ends_with("data: [DONE]"));
}

/// **Scenario**: `/v1/chat/stop` acknowledges an explicit stop request.
#[tokio::test]
async fn stop_request_is_acknowledged() {
    let (base_url, _dir) = common::spawn_gateway(common::MINIMAL_CONFIG).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base_url}/v1/chat/stop"))
        .json(&serde_json::json!({ "request_id": "whatever" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stopped"], true);
}
