//! Command-line interface for chatrelay
//!
//! Provides argument parsing and subcommand handling for the chatrelay binary.

use clap::{Parser, Subcommand};

/// Streaming chat and image relay for OpenAI-compatible providers
#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(version)]
#[command(about = "Streaming chat and image relay for OpenAI-compatible providers")]
#[command(
    long_about = "chatrelay accepts chat and image requests from browser clients, applies \
    a safety and input policy, and relays them to an OpenAI-compatible provider without \
    exposing the provider credential. API keys are read from the environment (or a .env file)."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# chatrelay Configuration
# =======================
#
# API keys are never stored here. They are read from the environment
# variables named below (a .env file next to the binary is also loaded).

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# Upper bound for one request in seconds, including the streamed body (1-300)
request_timeout_seconds = 60

# Largest accepted request body in bytes. Vision requests carry images inline
# as base64, so keep this well above the size of a typical photo.
max_body_bytes = 10485760

# ─────────────────────────────────────────────────────────────────────────────
# UPSTREAM PROVIDER
# ─────────────────────────────────────────────────────────────────────────────
#
# Any OpenAI-compatible API exposing /chat/completions and /images/generations.

[upstream]
base_url = "https://api.siliconflow.cn/v1"

# Environment variable holding the bearer token
api_key_env = "DEEPSEEK_API_KEY"

# Model used when a chat request does not name one
chat_model = "deepseek-ai/DeepSeek-V3"

# Output-token budget for every chat completion
max_tokens = 4096

image_model = "black-forest-labs/FLUX.1-schnell"
image_size = "1024x1024"

# ─────────────────────────────────────────────────────────────────────────────
# INPUT POLICY
# ─────────────────────────────────────────────────────────────────────────────

[policy]
# Character cap for any single piece of message text
max_input_chars = 6000
truncation_marker = "...[truncated]"

# Models whose name contains this marker (case-insensitive) accept images
vision_marker = "VL"

# Leading system instruction for every chat request (empty string disables it)
# safety_prompt = "..."

# ─────────────────────────────────────────────────────────────────────────────
# WEB SEARCH (Optional)
# ─────────────────────────────────────────────────────────────────────────────
#
# Used only when a request sets "useSearch": true and the key variable is set.

[search]
base_url = "https://api.tavily.com"
api_key_env = "TAVILY_API_KEY"

# Results injected per query (1-10)
max_results = 3

# Characters of the latest user turn used as the query
max_query_chars = 400

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // Clap's built-in verification for the CLI structure
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::parse_from(["chatrelay"]);
        assert_eq!(cli.config, "config.toml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn custom_config_path() {
        let cli = Cli::parse_from(["chatrelay", "--config", "custom.toml"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn config_subcommand_with_output() {
        let cli = Cli::parse_from(["chatrelay", "config", "-o", "my-config.toml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: Some(ref path) }) if path == "my-config.toml"
        ));
    }

    #[test]
    fn template_parses_as_valid_config() {
        let config: Config =
            toml::from_str(generate_config_template()).expect("template should deserialize");
        config.validate().expect("template should validate");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upstream.chat_model, "deepseek-ai/DeepSeek-V3");
        assert_eq!(config.search.max_results, 3);
    }

    #[test]
    fn template_has_all_sections() {
        let template = generate_config_template();
        for section in ["[server]", "[upstream]", "[policy]", "[search]", "[observability]"] {
            assert!(template.contains(section), "missing {section}");
        }
    }

    #[test]
    fn template_contains_no_secrets() {
        let template = generate_config_template();
        assert!(!template.contains("sk-"));
        assert!(!template.contains("tvly-"));
    }
}
