//! Wire types for the upstream OpenAI-compatible API

use crate::pipeline::types::Message;
use serde::{Deserialize, Serialize};

/// Body of `POST {base_url}/chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    pub max_tokens: u32,
}

/// One streamed chat completion event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Some providers report failures inside the stream instead of via status
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// Text carried by the first choice, empty when absent
    pub fn into_delta(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .unwrap_or_default()
    }
}

/// Body of `POST {base_url}/images/generations`
#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub n: u32,
    pub size: &'a str,
    pub response_format: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub data: Vec<ImageDatum>,
    /// SiliconFlow mirrors results under `images`
    #[serde(default)]
    pub images: Vec<ImageDatum>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageDatum {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub b64_json: Option<String>,
}

impl ImageDatum {
    /// Displayable image reference: a data URI for base64, else the URL
    pub fn to_image_ref(&self) -> Option<String> {
        if let Some(b64) = self.b64_json.as_deref().filter(|s| !s.is_empty()) {
            return Some(format!("data:image/png;base64,{}", b64));
        }
        self.url.clone().filter(|s| !s.is_empty())
    }
}

impl ImageGenerationResponse {
    /// First usable image reference in the reply
    pub fn first_image_ref(&self) -> Option<String> {
        self.data
            .iter()
            .chain(self.images.iter())
            .find_map(ImageDatum::to_image_ref)
    }
}

/// Provider error payload (`{"error": {"message": ...}}` or `{"message": ...}`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Nested { error: NestedError },
    Flat { message: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NestedError {
    Object(ErrorBody),
    Text(String),
}

/// Pull the provider's human-readable message out of an error body
///
/// Falls back to the raw body, then to the HTTP status line.
pub fn extract_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| match payload {
            ErrorPayload::Nested {
                error: NestedError::Object(ErrorBody { message }),
            } => message,
            ErrorPayload::Nested {
                error: NestedError::Text(text),
            } => Some(text),
            ErrorPayload::Flat { message } => Some(message),
        })
        .filter(|m| !m.trim().is_empty());

    if let Some(message) = parsed {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("Upstream returned {}", status)
    } else {
        trimmed.to_string()
    }
}
