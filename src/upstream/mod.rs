//! Upstream inference provider
//!
//! Provides the explicitly constructed [`UpstreamClient`] plus the wire types
//! and SSE decoding used for streamed chat completions.

pub mod client;
pub mod sse;
pub mod types;

pub use client::UpstreamClient;
pub use sse::{ChunkStream, UpstreamChunk};
