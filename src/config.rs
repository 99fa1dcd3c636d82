//! Configuration management for chatrelay
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Secrets never live in the file: API keys are read from the environment
//! variables named by `upstream.api_key_env` and `search.api_key_env`.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for any request timeout, in seconds
const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 300;
/// Upper bound for search results requested per query
const MAX_SEARCH_RESULTS: usize = 10;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum duration of one request, including the streamed body
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Largest accepted request body; inline base64 images count against it
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Upstream inference provider (OpenAI-compatible API)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the bearer credential
    #[serde(default = "default_upstream_key_env")]
    pub api_key_env: String,
    /// Model used when a chat request does not name one
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Output-token budget sent with every chat completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            api_key_env: default_upstream_key_env(),
            chat_model: default_chat_model(),
            max_tokens: default_max_tokens(),
            image_model: default_image_model(),
            image_size: default_image_size(),
        }
    }
}

fn default_upstream_base_url() -> String {
    "https://api.siliconflow.cn/v1".to_string()
}

fn default_upstream_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

fn default_chat_model() -> String {
    "deepseek-ai/DeepSeek-V3".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_image_model() -> String {
    "black-forest-labs/FLUX.1-schnell".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

/// Input/output safety policy applied by the request normalizer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Character cap for any single piece of message text
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,
    /// Substring (case-insensitive) identifying vision-capable models
    #[serde(default = "default_vision_marker")]
    pub vision_marker: String,
    /// Leading system instruction for every chat request; empty disables it
    #[serde(default = "default_safety_prompt")]
    pub safety_prompt: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            truncation_marker: default_truncation_marker(),
            vision_marker: default_vision_marker(),
            safety_prompt: default_safety_prompt(),
        }
    }
}

fn default_max_input_chars() -> usize {
    6000
}

fn default_truncation_marker() -> String {
    "...[truncated]".to_string()
}

fn default_vision_marker() -> String {
    "VL".to_string()
}

fn default_safety_prompt() -> String {
    "You must refuse to generate content that is illegal, violent, promotes self-harm, \
     is sexually explicit, or expresses hate speech. If a request asks for such content, \
     decline briefly and offer a safe alternative."
        .to_string()
}

/// Web-search provider used for optional context augmentation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key_env: default_search_key_env(),
            max_results: default_max_results(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_max_query_chars() -> usize {
    400
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// API keys resolved from the process environment
///
/// Kept separate from [`Config`] so that secrets are never serialized back
/// out (e.g. by the `config` subcommand) and so tests can inject fakes.
#[derive(Clone)]
pub struct Credentials {
    pub upstream_api_key: String,
    pub search_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("upstream_api_key", &"<redacted>")
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the variables named in the config
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the upstream key is missing or blank.
    /// A missing search key only disables search augmentation.
    pub fn from_env(config: &Config) -> AppResult<Self> {
        let upstream_api_key = std::env::var(&config.upstream.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config(format!(
                    "environment variable {} must hold the upstream API key",
                    config.upstream.api_key_env
                ))
            })?;

        let search_api_key = std::env::var(&config.search.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        if search_api_key.is_none() {
            tracing::info!(
                env_var = %config.search.api_key_env,
                "No search API key configured, web search augmentation disabled"
            );
        }

        Ok(Self {
            upstream_api_key,
            search_api_key,
        })
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()`, and explicitly by callers that build a
    /// `Config` in code.
    pub fn validate(&self) -> AppResult<()> {
        if self.server.request_timeout_seconds == 0
            || self.server.request_timeout_seconds > MAX_REQUEST_TIMEOUT_SECONDS
        {
            return Err(AppError::Config(format!(
                "server.request_timeout_seconds must be between 1 and {}, got {}",
                MAX_REQUEST_TIMEOUT_SECONDS, self.server.request_timeout_seconds
            )));
        }

        if self.server.max_body_bytes == 0 {
            return Err(AppError::Config(
                "server.max_body_bytes must be greater than 0".to_string(),
            ));
        }

        for (field, url) in [
            ("upstream.base_url", &self.upstream.base_url),
            ("search.base_url", &self.search.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "{} must start with 'http://' or 'https://', got '{}'",
                    field, url
                )));
            }
        }

        for (field, value) in [
            ("upstream.api_key_env", &self.upstream.api_key_env),
            ("upstream.chat_model", &self.upstream.chat_model),
            ("upstream.image_model", &self.upstream.image_model),
            ("policy.vision_marker", &self.policy.vision_marker),
            ("search.api_key_env", &self.search.api_key_env),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} cannot be empty", field)));
            }
        }

        if self.upstream.max_tokens == 0 {
            return Err(AppError::Config(
                "upstream.max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.policy.max_input_chars == 0 {
            return Err(AppError::Config(
                "policy.max_input_chars must be greater than 0".to_string(),
            ));
        }

        if self.search.max_results == 0 || self.search.max_results > MAX_SEARCH_RESULTS {
            return Err(AppError::Config(format!(
                "search.max_results must be between 1 and {}, got {}",
                MAX_SEARCH_RESULTS, self.search.max_results
            )));
        }

        if self.search.max_query_chars == 0 {
            return Err(AppError::Config(
                "search.max_query_chars must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.server.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        toml::from_str(
            r#"
[server]
host = "127.0.0.1"
port = 3000
"#,
        )
        .expect("should parse minimal config")
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = minimal_config();
        assert_eq!(config.server.request_timeout_seconds, 60);
        assert_eq!(config.server.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.upstream.base_url, "https://api.siliconflow.cn/v1");
        assert_eq!(config.upstream.chat_model, "deepseek-ai/DeepSeek-V3");
        assert_eq!(config.upstream.image_size, "1024x1024");
        assert_eq!(config.policy.max_input_chars, 6000);
        assert_eq!(config.policy.vision_marker, "VL");
        assert!(!config.policy.safety_prompt.is_empty());
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = minimal_config();
        config.server.request_timeout_seconds = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("request_timeout_seconds"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_max_body_bytes() {
        let mut config = minimal_config();
        config.server.max_body_bytes = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_body_bytes"), "got: {err}");
    }

    #[test]
    fn test_rejects_timeout_over_limit() {
        let mut config = minimal_config();
        config.server.request_timeout_seconds = 301;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_base_url_without_scheme() {
        let mut config = minimal_config();
        config.upstream.base_url = "api.siliconflow.cn/v1".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("upstream.base_url"), "got: {err}");
    }

    #[test]
    fn test_rejects_empty_vision_marker() {
        let mut config = minimal_config();
        config.policy.vision_marker = "  ".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("policy.vision_marker"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_input_cap() {
        let mut config = minimal_config();
        config.policy.max_input_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_too_many_search_results() {
        let mut config = minimal_config();
        config.search.max_results = 11;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("search.max_results"), "got: {err}");
    }

    #[test]
    fn test_empty_safety_prompt_is_allowed() {
        let mut config = minimal_config();
        config.policy.safety_prompt = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials_debug_redacts_keys() {
        let creds = Credentials {
            upstream_api_key: "sk-secret".to_string(),
            search_api_key: Some("tvly-secret".to_string()),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("tvly-secret"));
    }
}
