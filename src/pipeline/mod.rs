//! Request pipeline shared by the chat and image handlers
//!
//! Chat: normalize → (augment) → invoke → relay.
//! Image: validate → invoke.
//!
//! A chat request runs against one deadline of `server.request_timeout_seconds`
//! covering search, the upstream call and the relayed stream. Search may use at
//! most half of it so the upstream call always keeps the rest.
//!
//! The pipeline owns everything a request needs (options, upstream client,
//! optional search provider, metrics) as explicit values, so handlers and
//! tests construct it directly instead of touching global state.

pub mod normalizer;
pub mod relay;
pub mod types;

use crate::config::{Config, PolicyConfig, SearchConfig, UpstreamConfig};
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::search::{self, SearchProvider};
use crate::upstream::UpstreamClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub use normalizer::{NormalizedChat, normalize};
pub use relay::StreamRelay;
pub use types::{ChatMode, ChatRequest, ImageRequest, Message};

/// Options that parameterize the pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub policy: PolicyConfig,
    pub upstream: UpstreamConfig,
    pub search: SearchConfig,
    /// Upper bound for one chat request, streamed body included
    pub request_timeout: Duration,
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            policy: config.policy.clone(),
            upstream: config.upstream.clone(),
            search: config.search.clone(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// The chat/image request pipeline
pub struct Pipeline {
    options: PipelineOptions,
    client: UpstreamClient,
    search: Option<Arc<dyn SearchProvider>>,
    metrics: Metrics,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        client: UpstreamClient,
        search: Option<Arc<dyn SearchProvider>>,
        metrics: Metrics,
    ) -> Self {
        Self {
            options,
            client,
            search,
            metrics,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run a chat request through to a live relay
    ///
    /// Every failure before the upstream accepts the request is returned as
    /// an error; failures after that surface through the relay stream.
    pub async fn chat(&self, request: ChatRequest) -> AppResult<StreamRelay> {
        let started = Instant::now();
        let deadline = started + self.options.request_timeout;

        let normalized = normalize(request, &self.options.policy, &self.options.upstream)?;

        tracing::info!(
            model = %normalized.model,
            mode = ?normalized.mode,
            vision = normalized.vision,
            use_search = normalized.use_search,
            messages_count = normalized.messages.len(),
            "Chat request normalized"
        );

        let messages = if normalized.use_search {
            search::augment(
                normalized.messages,
                self.search.as_deref(),
                &self.options.search,
                &self.metrics,
                started + self.options.request_timeout / 2,
            )
            .await
        } else {
            normalized.messages
        };

        let upstream = tokio::time::timeout_at(
            deadline,
            self.client.chat_stream(&normalized.model, &messages),
        )
        .await
        .map_err(|_| AppError::upstream("Upstream request timed out"))??;

        Ok(StreamRelay::spawn_until(
            upstream,
            self.metrics.clone(),
            deadline,
        ))
    }

    /// Run an image request and return the displayable image reference
    pub async fn image(&self, request: ImageRequest) -> AppResult<String> {
        let prompt = request
            .prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Validation("Prompt is required".to_string()))?;

        tracing::info!(
            prompt = %prompt,
            model = %self.options.upstream.image_model,
            "[Image Gen] Generating image"
        );

        self.client.generate_image(&prompt).await
    }
}
