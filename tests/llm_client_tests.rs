//! 文本生成客户端集成测试（mockito 模拟上游）

use assert_matches::assert_matches;
use mockito::{Matcher, Server};
use serde_json::json;
use study_assistant_lib::config::LlmConfig;
use study_assistant_lib::error::AppError;
use study_assistant_lib::llm::{prompts, ChatCompletionClient, TextGenerator};

fn client_for(server: &Server, api_key: Option<&str>) -> ChatCompletionClient {
    ChatCompletionClient::new(LlmConfig {
        base_url: server.url(),
        api_key: api_key.map(str::to_string),
        model: "test-model".to_string(),
        timeout_secs: 5,
        ..LlmConfig::default()
    })
    .expect("client")
}

#[tokio::test]
async fn test_generate_returns_first_choice() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({ "model": "test-model", "max_tokens": 800 })),
            Matcher::Regex("Photosynthesis".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"- Light to sugar"}}]}"#)
        .create_async()
        .await;

    let client = client_for(&server, Some("test-key"));
    let text = client
        .generate(&prompts::summary("Photosynthesis"))
        .await
        .expect("generate");
    assert_eq!(text, "- Light to sugar");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_generate_surfaces_upstream_error_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"message":"Rate limit reached for model","type":"tokens"}}"#)
        .create_async()
        .await;

    let client = client_for(&server, Some("test-key"));
    let err = client.generate(&prompts::summary("x")).await.unwrap_err();
    assert_matches!(err, AppError::Upstream(ref m) if m == "Rate limit reached for model");
}

#[tokio::test]
async fn test_generate_falls_back_to_raw_body() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("service unavailable")
        .create_async()
        .await;

    let client = client_for(&server, Some("test-key"));
    let err = client.generate(&prompts::summary("x")).await.unwrap_err();
    assert_matches!(err, AppError::Upstream(ref m) if m == "service unavailable");
}

#[tokio::test]
async fn test_generate_without_api_key_skips_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let err = client.generate(&prompts::summary("x")).await.unwrap_err();
    assert_matches!(err, AppError::Upstream(_));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_generate_rejects_missing_content() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[]}"#)
        .create_async()
        .await;

    let client = client_for(&server, Some("test-key"));
    let err = client.generate(&prompts::summary("x")).await.unwrap_err();
    assert_matches!(err, AppError::Upstream(ref m) if m.contains("no message content"));
}
