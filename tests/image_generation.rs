//! Integration tests for POST /api/image
//!
//! Covers the two upstream image shapes (hosted URL and inline base64),
//! prompt validation, and method handling.

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
    matchers::{body_partial_json, method, path},
};

fn create_test_config(upstream_url: &str) -> Config {
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = 8080

[upstream]
base_url = "{upstream_url}/v1"
image_model = "black-forest-labs/FLUX.1-schnell"
image_size = "1024x1024"
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

async fn post_image(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/image")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_hosted_url_is_returned_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(body_partial_json(serde_json::json!({
            "model": "black-forest-labs/FLUX.1-schnell",
            "prompt": "a red fox in snow",
            "size": "1024x1024",
            "n": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "images": [{"url": "https://cdn.example.com/fox.png"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_test_app(create_test_config(&server.uri()));
    let (status, json) = post_image(app, serde_json::json!({"prompt": "a red fox in snow"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["image"], "https://cdn.example.com/fox.png");
    assert_eq!(json["status"], "success");
}

#[tokio::test]
async fn test_base64_payload_becomes_data_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"b64_json": "iVBORw0KGgo="}]
        })))
        .mount(&server)
        .await;

    let app = create_test_app(create_test_config(&server.uri()));
    let (status, json) = post_image(app, serde_json::json!({"prompt": "lighthouse"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["image"], "data:image/png;base64,iVBORw0KGgo=");
}

#[tokio::test]
async fn test_missing_prompt_never_reaches_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = create_test_app(create_test_config(&server.uri()));
    for body in [
        serde_json::json!({}),
        serde_json::json!({"prompt": ""}),
        serde_json::json!({"prompt": "   "}),
    ] {
        let (status, json) = post_image(app.clone(), body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Prompt is required");
    }
}

#[tokio::test]
async fn test_empty_upstream_payload_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;

    let app = create_test_app(create_test_config(&server.uri()));
    let (status, json) = post_image(app, serde_json::json!({"prompt": "anything"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "[Server] API returned empty image data");
}

#[tokio::test]
async fn test_upstream_error_message_is_prefixed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "message": "prompt rejected by content filter"
        })))
        .mount(&server)
        .await;

    let app = create_test_app(create_test_config(&server.uri()));
    let (status, json) = post_image(app, serde_json::json!({"prompt": "x"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "[Server] prompt rejected by content filter");
}

#[tokio::test]
async fn test_get_on_image_is_method_not_allowed() {
    let app = create_test_app(create_test_config("http://127.0.0.1:9"));
    let request = Request::builder()
        .method("GET")
        .uri("/api/image")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
