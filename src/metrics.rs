//! Prometheus metrics collection for chatrelay
//!
//! This module provides metrics instrumentation for tracking:
//! - Request outcomes by endpoint
//! - Relayed stream chunks and client-side cancellations
//! - Upstream failures by endpoint
//! - Swallowed search-provider failures
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Relay endpoint enum for type-safe metrics labels
///
/// Restricts the `endpoint` label to the two handlers, keeping cardinality fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    Image,
}

impl Endpoint {
    /// Convert endpoint to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Image => "image",
        }
    }
}

/// Request outcome enum for type-safe metrics labels
///
/// A chat request gets its outcome when the relayed stream ends, so a stream
/// that breaks mid-response is an `Error`, never a `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
    /// Client disconnected before the stream finished
    Cancelled,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Metrics collector for chatrelay
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: IntCounterVec,
    upstream_errors: IntCounterVec,
    stream_chunks: IntCounter,
    stream_cancellations: IntCounter,
    mid_stream_failures: IntCounter,
    search_failures: IntCounter,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 endpoints × 3 outcomes = 6 time series
        let requests_total = IntCounterVec::new(
            Opts::new(
                "chatrelay_requests_total",
                "Total number of relay requests by endpoint and outcome (chat outcomes are recorded when the stream ends)",
            ),
            &["endpoint", "outcome"],
        )?;

        let upstream_errors = IntCounterVec::new(
            Opts::new(
                "chatrelay_upstream_errors_total",
                "Total number of upstream provider failures by endpoint",
            ),
            &["endpoint"],
        )?;

        let stream_chunks = IntCounter::with_opts(Opts::new(
            "chatrelay_stream_chunks_total",
            "Total number of non-empty text deltas relayed to clients",
        ))?;

        // Client went away before the upstream stream finished
        let stream_cancellations = IntCounter::with_opts(Opts::new(
            "chatrelay_stream_cancellations_total",
            "Total number of streams cancelled because the client disconnected",
        ))?;

        let mid_stream_failures = IntCounter::with_opts(Opts::new(
            "chatrelay_mid_stream_failures_total",
            "Total number of upstream failures after streaming had started",
        ))?;

        // Non-fatal: the request continues without augmentation
        let search_failures = IntCounter::with_opts(Opts::new(
            "chatrelay_search_failures_total",
            "Total number of search-provider failures swallowed by the augmenter",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(upstream_errors.clone()))?;
        registry.register(Box::new(stream_chunks.clone()))?;
        registry.register(Box::new(stream_cancellations.clone()))?;
        registry.register(Box::new(mid_stream_failures.clone()))?;
        registry.register(Box::new(search_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            upstream_errors,
            stream_chunks,
            stream_cancellations,
            mid_stream_failures,
            search_failures,
        })
    }

    /// Record a finished request
    pub fn record_request(&self, endpoint: Endpoint, outcome: Outcome) {
        self.requests_total
            .with_label_values(&[endpoint.as_str(), outcome.as_str()])
            .inc();
    }

    /// Number of requests recorded for an endpoint/outcome pair
    pub fn requests_count(&self, endpoint: Endpoint, outcome: Outcome) -> u64 {
        self.requests_total
            .with_label_values(&[endpoint.as_str(), outcome.as_str()])
            .get()
    }

    pub fn upstream_error(&self, endpoint: Endpoint) {
        self.upstream_errors
            .with_label_values(&[endpoint.as_str()])
            .inc();
    }

    pub fn upstream_errors_count(&self, endpoint: Endpoint) -> u64 {
        self.upstream_errors
            .with_label_values(&[endpoint.as_str()])
            .get()
    }

    pub fn stream_chunk(&self) {
        self.stream_chunks.inc();
    }

    pub fn stream_chunks_count(&self) -> u64 {
        self.stream_chunks.get()
    }

    pub fn stream_cancelled(&self) {
        self.stream_cancellations.inc();
    }

    pub fn stream_cancellations_count(&self) -> u64 {
        self.stream_cancellations.get()
    }

    pub fn mid_stream_failure(&self) {
        self.mid_stream_failures.inc();
    }

    pub fn mid_stream_failures_count(&self) -> u64 {
        self.mid_stream_failures.get()
    }

    pub fn search_failure(&self) {
        self.search_failures.inc();
    }

    pub fn search_failures_count(&self) -> u64 {
        self.search_failures.get()
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                "Prometheus text encoder failed"
            );
            prometheus::Error::Msg(format!(
                "Failed to encode {} metric families: {}",
                metric_count, e
            ))
        })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                e.utf8_error().valid_up_to(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_labels() {
        assert_eq!(Endpoint::Chat.as_str(), "chat");
        assert_eq!(Endpoint::Image.as_str(), "image");
    }

    #[test]
    fn test_record_request_counts_per_label() {
        let metrics = Metrics::new().expect("metrics should register");
        metrics.record_request(Endpoint::Chat, Outcome::Success);
        metrics.record_request(Endpoint::Chat, Outcome::Success);
        metrics.record_request(Endpoint::Image, Outcome::Error);

        assert_eq!(metrics.requests_count(Endpoint::Chat, Outcome::Success), 2);
        assert_eq!(metrics.requests_count(Endpoint::Image, Outcome::Error), 1);
        assert_eq!(metrics.requests_count(Endpoint::Image, Outcome::Success), 0);
    }

    #[test]
    fn test_gather_contains_registered_names() {
        let metrics = Metrics::new().expect("metrics should register");
        metrics.record_request(Endpoint::Chat, Outcome::Success);
        metrics.stream_chunk();
        metrics.search_failure();

        let output = metrics.gather().expect("gather should succeed");
        assert!(output.contains("chatrelay_requests_total"));
        assert!(output.contains("chatrelay_stream_chunks_total 1"));
        assert!(output.contains("chatrelay_search_failures_total 1"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.stream_cancelled();
        assert_eq!(a.stream_cancellations_count(), 1);
        assert_eq!(b.stream_cancellations_count(), 0);
    }
}
