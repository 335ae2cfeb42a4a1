//! Upstream HTTP contract tests.
//!
//! Runs the OpenAI-compatible provider against a wiremock server, then drives
//! a full chat exchange (classification plus completion) through the router
//! with the real provider.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use genome_common::config::Config;
use genome_gateway::{
    build_routes, create_provider, AppState, ChatRequest, CompatibleProvider, Message, Provider,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: Value) -> Value {
    json!({
        "model": "meta-llama/llama-4-scout-17b-16e-instruct",
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    })
}

fn request(text: &str) -> ChatRequest {
    ChatRequest {
        model: "meta-llama/llama-4-scout-17b-16e-instruct".into(),
        messages: vec![Message::user(text)],
        max_tokens: Some(1000),
        temperature: Some(0.7),
    }
}

#[tokio::test]
async fn test_provider_sends_openai_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(bearer_token("gsk_test"))
        .and(body_partial_json(json!({
            "model": "meta-llama/llama-4-scout-17b-16e-instruct",
            "messages": [{"role": "user", "content": "hello"}],
            "temperature": 0.7,
            "max_tokens": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("Hi!"))))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CompatibleProvider::groq(Some("gsk_test")).with_base_url(&server.uri());
    let response = provider.chat(request("hello")).await.unwrap();

    assert_eq!(response.provider, "groq");
    assert_eq!(response.content.as_deref(), Some("Hi!"));
    assert_eq!(response.usage.total_tokens, 15);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn test_provider_maps_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let provider = CompatibleProvider::groq(Some("bad")).with_base_url(&server.uri());
    let err = provider.chat(request("hello")).await.unwrap_err();

    assert_eq!(err.status_code, Some(401));
    assert!(err.message.contains("API error (401)"));
    assert!(err.message.contains("invalid api key"));
}

#[tokio::test]
async fn test_provider_null_content_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(Value::Null)))
        .mount(&server)
        .await;

    let provider = CompatibleProvider::openai(Some("sk-test")).with_base_url(&server.uri());
    let response = provider.chat(request("hello")).await.unwrap();
    assert!(response.content.is_none());
}

fn configured(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.llm.provider = "custom".into();
    config.llm.base_url = Some(server.uri());
    config.secrets.llm.custom = Some("local-key".into());
    config
}

async fn post_chat(app: &axum::Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_chat_exchange_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"temperature": 0.1, "max_tokens": 10})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!(" YES "))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"temperature": 0.7, "max_tokens": 1000})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!("Aim for 7 to 9 hours of sleep."))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = configured(&server);
    let app = build_routes(AppState::new(&config, create_provider(&config).unwrap()));

    let (status, body) =
        post_chat(&app, json!({"message": "How much sleep?", "sessionId": "http"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Aim for 7 to 9 hours of sleep.");
    assert_eq!(body["conversationLength"], 2);
    assert_eq!(body["filtered"], false);
}

#[tokio::test]
async fn test_classifier_outage_fails_open_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 10})))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 1000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("Hello!"))))
        .expect(1)
        .mount(&server)
        .await;

    let config = configured(&server);
    let app = build_routes(AppState::new(&config, create_provider(&config).unwrap()));

    let (status, body) = post_chat(&app, json!({"message": "hello"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Hello!");
    assert_eq!(body["sessionId"], "default");
}

#[tokio::test]
async fn test_completion_outage_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 10})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("yes"))))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 1000})))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&server)
        .await;

    let config = configured(&server);
    let app = build_routes(AppState::new(&config, create_provider(&config).unwrap()));

    let (status, body) = post_chat(&app, json!({"message": "I have a fever"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to get AI response");
    assert!(body["details"].as_str().unwrap().contains("model overloaded"));
}
