//! HTTP request handlers for the chatrelay API

use crate::config::{Config, Credentials};
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::middleware::{cors_middleware, request_id_middleware};
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::search::{SearchProvider, TavilySearch};
use crate::upstream::UpstreamClient;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod chat;
pub mod extractor;
pub mod health;
pub mod image;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd (or internally Arc'd) for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pipeline: Arc<Pipeline>,
    metrics: Metrics,
}

impl AppState {
    /// Create a new AppState from configuration and resolved credentials
    ///
    /// # Errors
    ///
    /// Returns an error if metrics registration or HTTP client construction fails.
    pub fn new(config: Config, credentials: Credentials) -> AppResult<Self> {
        let metrics = Metrics::new().map_err(|e| {
            crate::error::AppError::Internal(format!("Failed to initialize metrics: {}", e))
        })?;

        let timeout = config.request_timeout();
        let client = UpstreamClient::new(&config.upstream, credentials.upstream_api_key, timeout)?;

        let search: Option<Arc<dyn SearchProvider>> = match credentials.search_api_key {
            Some(key) => Some(Arc::new(TavilySearch::new(&config.search, key, timeout)?)),
            None => None,
        };

        let pipeline = Pipeline::new(
            PipelineOptions::from(&config),
            client,
            search,
            metrics.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics,
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the request pipeline
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Get reference to the metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Fallback for unsupported methods on the relay endpoints
pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Build the full application router
///
/// Routes:
/// - `POST /api/chat` - streamed chat relay
/// - `POST /api/image` - image generation
/// - `GET /health` - liveness
/// - `GET /metrics` - Prometheus metrics
///
/// Request bodies are capped at `server.max_body_bytes` instead of axum's
/// 2 MB default.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().server.max_body_bytes;

    Router::new()
        .route(
            "/api/chat",
            post(chat::handler).fallback(method_not_allowed),
        )
        .route(
            "/api/image",
            post(image::handler).fallback(method_not_allowed),
        )
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
