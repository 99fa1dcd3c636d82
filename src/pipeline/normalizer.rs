//! Request normalizer for chat traffic
//!
//! Turns a raw [`ChatRequest`] into the exact message list sent upstream:
//! oversize text is truncated, the vision/model pairing is checked, and the
//! safety and mode instructions are prepended.

use super::types::{ChatMode, ChatRequest, ContentPart, Message, MessageContent};
use crate::config::{PolicyConfig, UpstreamConfig};
use crate::error::{AppError, AppResult};

const DEFAULT_INSTRUCTION: &str = "You are a helpful assistant.";
const ASK_INSTRUCTION: &str = "You are a professional translator and editor.";

/// Validated chat request ready for augmentation and invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedChat {
    pub messages: Vec<Message>,
    pub model: String,
    pub mode: ChatMode,
    pub use_search: bool,
    pub vision: bool,
}

/// Mode instruction for non-vision requests
pub fn mode_instruction(mode: ChatMode, length: Option<&str>) -> String {
    match mode {
        ChatMode::Default => DEFAULT_INSTRUCTION.to_string(),
        ChatMode::Ask => ASK_INSTRUCTION.to_string(),
        ChatMode::Write => format!(
            "You are a professional writer. Target length: {}.",
            length.unwrap_or("any")
        ),
    }
}

/// Cut `text` to `cap` characters and append `marker` when it is longer
///
/// Counts Unicode scalar values, so multi-byte text is never split mid-character.
/// Returns `None` when the text already fits.
pub fn truncate_text(text: &str, cap: usize, marker: &str) -> Option<String> {
    let (cut, _) = text.char_indices().nth(cap)?;
    let mut truncated = String::with_capacity(cut + marker.len());
    truncated.push_str(&text[..cut]);
    truncated.push_str(marker);
    Some(truncated)
}

fn truncate_content(content: &mut MessageContent, policy: &PolicyConfig) -> bool {
    let cap = policy.max_input_chars;
    let marker = policy.truncation_marker.as_str();
    match content {
        MessageContent::Text(text) => match truncate_text(text, cap, marker) {
            Some(cut) => {
                *text = cut;
                true
            }
            None => false,
        },
        MessageContent::Parts(parts) => {
            let mut truncated = false;
            for part in parts.iter_mut() {
                if let ContentPart::Text { text } = part
                    && let Some(cut) = truncate_text(text, cap, marker)
                {
                    *text = cut;
                    truncated = true;
                }
            }
            truncated
        }
    }
}

/// True when the model identifier carries the vision marker (case-insensitive)
pub fn is_vision_model(model: &str, marker: &str) -> bool {
    model.to_lowercase().contains(&marker.to_lowercase())
}

/// Normalize a chat request
///
/// # Errors
///
/// - `AppError::Validation` if `messages` is empty
/// - `AppError::ModelMismatch` if an image part targets a non-vision model
pub fn normalize(
    request: ChatRequest,
    policy: &PolicyConfig,
    upstream: &UpstreamConfig,
) -> AppResult<NormalizedChat> {
    let ChatRequest {
        messages,
        model,
        mode,
        length,
        use_search,
    } = request;

    if messages.is_empty() {
        return Err(AppError::Validation(
            "messages array cannot be empty".to_string(),
        ));
    }

    let model = model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| upstream.chat_model.clone());

    let vision = messages.iter().any(|m| m.content.has_image());
    if vision && !is_vision_model(&model, &policy.vision_marker) {
        return Err(AppError::ModelMismatch {
            model,
            marker: policy.vision_marker.clone(),
        });
    }

    let mut truncated_count = 0usize;
    let mut body = messages;
    for message in body.iter_mut() {
        if truncate_content(&mut message.content, policy) {
            truncated_count += 1;
        }
    }

    if truncated_count > 0 {
        tracing::debug!(
            truncated_messages = truncated_count,
            max_input_chars = policy.max_input_chars,
            "Truncated oversize message content"
        );
    }

    let mut normalized = Vec::with_capacity(body.len() + 2);
    if !policy.safety_prompt.trim().is_empty() {
        normalized.push(Message::system(policy.safety_prompt.clone()));
    }
    // Vision models get minimal framing: no mode instruction
    if !vision {
        normalized.push(Message::system(mode_instruction(mode, length.as_deref())));
    }
    normalized.extend(body);

    Ok(NormalizedChat {
        messages: normalized,
        model,
        mode,
        use_search,
        vision,
    })
}
