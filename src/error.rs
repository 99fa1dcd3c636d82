//! Error types for chatrelay
//!
//! All errors implement `IntoResponse` for Axum handlers. Every failure a
//! client can observe is rendered as the same envelope:
//!
//! ```json
//! { "error": "..." }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Prefix attached to every error that originated from the upstream backend
pub const UPSTREAM_ERROR_PREFIX: &str = "[Server] ";

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("{0}")]
    Validation(String),

    #[error(
        "Model '{model}' does not accept image input. Choose a vision model (its name must contain '{marker}')."
    )]
    ModelMismatch { model: String, marker: String },

    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Search provider failed: {0}")]
    SearchProvider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build an upstream error without an HTTP status (transport or parse failure)
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// Text placed in the `error` field of the response envelope
    pub fn envelope_message(&self) -> String {
        match self {
            Self::Upstream { message, .. } => format!("{UPSTREAM_ERROR_PREFIX}{message}"),
            other => other.to_string(),
        }
    }

    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. } => "config",
            Self::Validation(_) => "validation",
            Self::ModelMismatch { .. } => "model_mismatch",
            Self::Upstream { .. } => "upstream",
            Self::SearchProvider(_) => "search_provider",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::upstream(format!("Upstream request timed out: {err}"));
        }
        Self::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Every client-visible failure is a server error; the envelope text
        // carries the distinction.
        let body = Json(serde_json::json!({
            "error": self.envelope_message(),
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
