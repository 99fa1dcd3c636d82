//! HTTP client for the upstream OpenAI-compatible inference API
//!
//! One `UpstreamClient` is built at startup from [`UpstreamConfig`] and the
//! resolved API key, then shared through `AppState`. Nothing about the
//! upstream lives in process-wide globals, so tests point it at a mock server.

use super::sse::{ChunkStream, chunk_stream};
use super::types::{
    ChatCompletionRequest, ImageGenerationRequest, ImageGenerationResponse,
    extract_error_message,
};
use crate::config::UpstreamConfig;
use crate::error::{AppError, AppResult};
use crate::pipeline::types::Message;
use reqwest::Client;
use std::time::Duration;

const IMAGE_RESPONSE_FORMAT: &str = "b64_json";

/// Client for chat-completion and image-generation calls
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    image_model: String,
    image_size: String,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .field("image_model", &self.image_model)
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    /// Build a client from configuration
    ///
    /// `timeout` bounds the whole request, including reading a streamed body.
    pub fn new(config: &UpstreamConfig, api_key: String, timeout: Duration) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
            image_model: config.image_model.clone(),
            image_size: config.image_size.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "Failed to send upstream request");
                AppError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = extract_error_message(status, &text);
            tracing::warn!(
                url = %url,
                status = status.as_u16(),
                message = %message,
                "Upstream rejected request"
            );
            return Err(AppError::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        Ok(response)
    }

    /// Start a streaming chat completion
    ///
    /// Returns once the upstream has accepted the request; the body is read
    /// lazily through the returned stream.
    pub async fn chat_stream(&self, model: &str, messages: &[Message]) -> AppResult<ChunkStream> {
        let request = ChatCompletionRequest {
            model,
            messages,
            stream: true,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(
            model = %model,
            messages_count = messages.len(),
            max_tokens = self.max_tokens,
            "Starting upstream chat completion stream"
        );

        let response = self.post("chat/completions", &request).await?;
        Ok(chunk_stream(response))
    }

    /// Generate one square image and return a displayable reference
    ///
    /// The result is either a `data:image/png;base64,...` URI or the URL the
    /// provider returned.
    pub async fn generate_image(&self, prompt: &str) -> AppResult<String> {
        let request = ImageGenerationRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size: &self.image_size,
            response_format: IMAGE_RESPONSE_FORMAT,
        };

        let response = self.post("images/generations", &request).await?;
        let body = response.text().await?;
        let parsed: ImageGenerationResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse image generation response");
            AppError::upstream(format!("Failed to parse image generation response: {}", e))
        })?;

        parsed
            .first_image_ref()
            .ok_or_else(|| AppError::upstream("API returned empty image data"))
    }
}
