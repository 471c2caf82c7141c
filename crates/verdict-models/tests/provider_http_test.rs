//! HTTP-level tests for the provider clients against a local mock server.

use mockito::Matcher;
use verdict_abstraction::{ChatMessage, Model, ModelError};
use verdict_models::{ClaudeModel, GeminiModel, ModelFactory, OpenAIModel, Provider};

fn messages() -> Vec<ChatMessage> {
    vec![ChatMessage::system("Reply with JSON only."), ChatMessage::user(r#"{"company":"Acme"}"#)]
}

#[tokio::test]
async fn test_openai_success_parses_content_and_usage() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "{\"score\": 7}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
            }"#,
        )
        .create_async()
        .await;

    let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "test-key".to_string()).with_base_url(&server.url());
    let response = model.generate_chat_completion(&messages(), None).await.unwrap();

    assert_eq!(response.content, r#"{"score": 7}"#);
    assert_eq!(response.usage.unwrap().total_tokens, 16);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_openai_rate_limit_maps_to_quota_exceeded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("rate limited")
        .create_async()
        .await;

    let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "k".to_string()).with_base_url(&server.url());
    let err = model.generate_chat_completion(&messages(), None).await.unwrap_err();

    assert_eq!(
        err,
        ModelError::QuotaExceeded { provider: "openai".to_string(), message: Some("rate limited".to_string()) }
    );
}

#[tokio::test]
async fn test_openai_server_error_is_response_error() {
    let mut server = mockito::Server::new_async().await;
    server.mock("POST", "/chat/completions").with_status(503).with_body("overloaded").create_async().await;

    let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "k".to_string()).with_base_url(&server.url());
    let err = model.generate_chat_completion(&messages(), None).await.unwrap_err();

    assert!(matches!(err, ModelError::ModelResponseError(ref m) if m.contains("503") && m.contains("overloaded")));
}

#[tokio::test]
async fn test_azure_uses_deployment_path_and_api_key_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/deployments/gpt-4o/chat/completions")
        .match_query(Matcher::UrlEncoded("api-version".into(), "2024-06-01".into()))
        .match_header("api-key", "azure-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#)
        .create_async()
        .await;

    let model = OpenAIModel::azure("gpt-4o".to_string(), &server.url(), "azure-key".to_string(), None);
    let response = model.generate_chat_completion(&messages(), None).await.unwrap();

    assert_eq!(response.content, "ok");
    assert!(response.usage.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_claude_sends_system_field_and_concatenates_text_blocks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/messages")
        .match_header("x-api-key", "claude-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(serde_json::json!({ "system": "Reply with JSON only." })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "content": [{"type": "text", "text": "{\"a\":"}, {"type": "text", "text": "1}"}],
                "usage": {"input_tokens": 10, "output_tokens": 3}
            }"#,
        )
        .create_async()
        .await;

    let model =
        ClaudeModel::with_api_key("claude-3-5-haiku".to_string(), "claude-key".to_string()).with_base_url(&server.url());
    let response = model.generate_chat_completion(&messages(), None).await.unwrap();

    assert_eq!(response.content, r#"{"a":1}"#);
    assert_eq!(response.usage.unwrap().total_tokens, 13);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_claude_candidate_sends_resolved_model_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/messages")
        .match_body(Matcher::PartialJson(serde_json::json!({ "model": "claude-3-5-sonnet-latest" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"content": [{"type": "text", "text": "{}"}]}"#)
        .create_async()
        .await;

    let model_id = ModelFactory::provider_model_id(Provider::Anthropic, "claude-3-5-sonnet");
    let model = ClaudeModel::with_api_key(model_id.to_string(), "claude-key".to_string()).with_base_url(&server.url());
    let response = model.generate_chat_completion(&messages(), None).await.unwrap();

    assert_eq!(response.content, "{}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_generate_content() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-1.5-flash:generateContent")
        .match_header("x-goog-api-key", "g-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "candidates": [{"content": {"role": "model", "parts": [{"text": "[1, 2]"}]}}],
                "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 2, "totalTokenCount": 7}
            }"#,
        )
        .create_async()
        .await;

    let model = GeminiModel::with_api_key("gemini-1.5-flash".to_string(), "g-key".to_string())
        .with_base_url(&server.url());
    let response = model.generate_chat_completion(&messages(), None).await.unwrap();

    assert_eq!(response.content, "[1, 2]");
    assert_eq!(response.usage.unwrap().prompt_tokens, 5);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_payment_required_is_quota() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/models/gemini-1.5-pro:generateContent")
        .with_status(402)
        .with_body("billing")
        .create_async()
        .await;

    let model =
        GeminiModel::with_api_key("gemini-1.5-pro".to_string(), "g".to_string()).with_base_url(&server.url());
    let err = model.generate_text("hi", None).await.unwrap_err();
    assert!(err.is_quota_exceeded());
}
