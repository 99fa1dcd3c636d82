//! JSON body extractor with relay-style error responses
//!
//! Axum's `Json` rejects requests with its own plain-text bodies and 4xx
//! statuses. The relay reports every bad body through the standard
//! `{ "error": ... }` envelope instead, and does not insist on a JSON
//! `Content-Type` header because browser clients frequently omit it.

use crate::error::AppError;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

/// JSON extractor whose rejection is an [`AppError::Validation`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayJson<T>(pub T);

/// Decode a request body, mapping every failure to a validation error
pub fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Validation("Request body is empty".to_string()));
    }

    serde_json::from_slice(bytes)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
}

impl<T, S> FromRequest<S> for RelayJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read request body: {}", e)))?;

        match decode_body(&bytes) {
            Ok(value) => Ok(RelayJson(value)),
            Err(e) => {
                tracing::debug!(error = %e, body_bytes = bytes.len(), "Rejected request body");
                Err(e)
            }
        }
    }
}
