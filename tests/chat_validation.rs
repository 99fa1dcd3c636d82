//! Integration tests for POST /api/chat request validation
//!
//! Every rejected request must fail before any upstream call and come back
//! as a 500 with the `{ "error": "..." }` envelope.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chatrelay::{
    config::{Config, Credentials},
    handlers::{self, AppState},
};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn create_test_config(upstream_url: &str) -> Config {
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = 8080

[upstream]
base_url = "{upstream_url}/v1"
chat_model = "deepseek-ai/DeepSeek-V3"
"#
    );
    toml::from_str(&toml).expect("should parse TOML config")
}

fn create_test_app(config: Config) -> Router {
    let credentials = Credentials {
        upstream_api_key: "test-key".to_string(),
        search_api_key: None,
    };
    handlers::router(AppState::new(config, credentials).expect("AppState::new should succeed"))
}

/// Mock upstream that fails the test if it is ever called
async fn untouchable_upstream() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    server
}

async fn post_raw(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).expect("error body should be JSON");
    (status, json)
}

#[tokio::test]
async fn test_empty_body_is_rejected() {
    let server = untouchable_upstream().await;
    let app = create_test_app(create_test_config(&server.uri()));

    let (status, json) = post_raw(app, "").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Request body is empty");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let server = untouchable_upstream().await;
    let app = create_test_app(create_test_config(&server.uri()));

    let (status, json) = post_raw(app, "{\"messages\": [").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = json["error"].as_str().unwrap();
    assert!(message.starts_with("Invalid JSON body"), "got: {message}");
}

#[tokio::test]
async fn test_missing_messages_is_rejected() {
    let server = untouchable_upstream().await;
    let app = create_test_app(create_test_config(&server.uri()));

    let (status, json) = post_raw(app, r#"{"type":"ask"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_empty_messages_array_is_rejected() {
    let server = untouchable_upstream().await;
    let app = create_test_app(create_test_config(&server.uri()));

    let (status, json) = post_raw(app, r#"{"messages":[]}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "messages array cannot be empty");
}

#[tokio::test]
async fn test_image_with_non_vision_model_is_rejected() {
    let server = untouchable_upstream().await;
    let app = create_test_app(create_test_config(&server.uri()));

    let body = serde_json::json!({
        "model": "deepseek-ai/DeepSeek-V3",
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": "describe this"},
                {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
            ]
        }]
    });
    let (status, json) = post_raw(app, &body.to_string()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("deepseek-ai/DeepSeek-V3"), "got: {message}");
    assert!(message.contains("vision"), "got: {message}");
}

#[tokio::test]
async fn test_image_with_default_model_is_rejected() {
    let server = untouchable_upstream().await;
    let app = create_test_app(create_test_config(&server.uri()));

    let body = serde_json::json!({
        "messages": [{
            "role": "user",
            "content": [
                {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,/9j/"}}
            ]
        }]
    });
    let (status, _) = post_raw(app, &body.to_string()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_get_on_chat_is_method_not_allowed() {
    let server = untouchable_upstream().await;
    let app = create_test_app(create_test_config(&server.uri()));

    let request = Request::builder()
        .method("GET")
        .uri("/api/chat")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Method Not Allowed");
}
