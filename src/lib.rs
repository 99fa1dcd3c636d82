//! chatrelay - Streaming chat and image relay for OpenAI-compatible providers
//!
//! Sits between untrusted browser clients and a credentialed upstream API.
//! Chat requests are normalized (safety prompt, mode instruction, input caps,
//! optional web-search context) and the upstream token stream is relayed back
//! with backpressure and disconnect cancellation. Image requests are reduced
//! to a single displayable image reference.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod search;
pub mod telemetry;
pub mod upstream;
