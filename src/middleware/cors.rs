//! CORS middleware for the relay endpoints
//!
//! Browsers call the relay directly, so every response (success, error,
//! method-not-allowed) carries the same three CORS headers, and `OPTIONS`
//! preflight requests are answered here without reaching a handler.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Insert the fixed CORS headers, replacing any existing values
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

/// Empty `200 OK` preflight response
pub fn preflight_response() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    apply_cors_headers(response.headers_mut());
    response
}

/// Middleware that short-circuits preflight and decorates every response
pub async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        tracing::debug!(uri = %request.uri(), "Answering CORS preflight");
        return preflight_response();
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}
